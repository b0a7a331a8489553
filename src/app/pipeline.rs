//! Shared "fit pipeline" logic used by the `fit` subcommand and the tests.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> convert -> rescale -> filter zeros -> fit/select
//!
//! Nothing is written to disk until every stage has succeeded.

use std::ffi::OsString;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::data::{convert, rescale};
use crate::domain::{CalibrationTable, DatasetStats, PipelineConfig, Sample};
use crate::error::{AppError, CalibrationError};
use crate::fit::selection::{FitSelection, fit_and_select};

/// All computed outputs of a single `maf fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Where the table came from, for the report header.
    pub source: String,
    /// The table after conversion/rescale.
    pub table: CalibrationTable,
    /// The samples actually fitted.
    pub samples: Vec<Sample>,
    pub stats: DatasetStats,
    pub selection: FitSelection,
}

/// Load `config.input` and run every stage.
pub fn run_pipeline(config: &PipelineConfig) -> Result<RunOutput, AppError> {
    let table = crate::io::load_table(&config.input)?;
    let source = config.input.display().to_string();
    Ok(run_with_table(source, table, config)?)
}

/// Run every stage on an already-loaded table.
pub fn run_with_table(
    source: impl Display,
    table: CalibrationTable,
    config: &PipelineConfig,
) -> Result<RunOutput, CalibrationError> {
    let mut table = table;

    if let Some(conv) = config.conversion {
        table = convert(&table, conv.factor, conv.rounding);
        debug!(factor = conv.factor, rounding = ?conv.rounding, "values converted");
    }

    if let Some(target) = config.rescale {
        table = rescale(&table, target.old_max, target.new_max)?;
    }

    let samples = table.samples(config.zero_filter);
    let stats = DatasetStats::compute(&table, &samples);
    info!(
        entries = stats.n_entries,
        samples = stats.n_samples,
        filter = ?config.zero_filter,
        "fitting samples"
    );

    let selection = fit_and_select(&samples, config)?;

    Ok(RunOutput {
        source: source.to_string(),
        table,
        samples,
        stats,
        selection,
    })
}

/// Write every output the config asks for. Call only after a successful run.
///
/// Each file is first written next to its destination as `<name>.partial`;
/// the destinations are replaced only once every output has been staged, so a
/// failed write leaves no new output behind.
pub fn write_outputs(
    config: &PipelineConfig,
    run: &RunOutput,
    report: &str,
    generated: NaiveDateTime,
) -> Result<(), AppError> {
    let mut staged = Vec::new();
    if let Err(e) = stage_outputs(config, run, report, generated, &mut staged) {
        discard(&staged);
        return Err(e);
    }

    for (i, (tmp, dest)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp, dest) {
            discard(&staged[i..]);
            return Err(AppError::new(
                2,
                format!("Failed to move output into place '{}': {e}", dest.display()),
            ));
        }
        debug!(path = %dest.display(), "output written");
    }
    Ok(())
}

fn stage_outputs<'a>(
    config: &'a PipelineConfig,
    run: &RunOutput,
    report: &str,
    generated: NaiveDateTime,
    staged: &mut Vec<(PathBuf, &'a Path)>,
) -> Result<(), AppError> {
    if let Some(path) = &config.output_table {
        let tmp = stage(path, staged);
        crate::io::write_table(&tmp, &run.table)?;
    }
    if let Some(path) = &config.report {
        let tmp = stage(path, staged);
        fs::write(&tmp, report)
            .map_err(|e| AppError::new(2, format!("Failed to write report '{}': {e}", path.display())))?;
    }
    if let Some(path) = &config.export_model {
        let tmp = stage(path, staged);
        crate::io::write_model_json(&tmp, &run.selection.best, &run.stats, &run.source, generated)?;
    }
    if let Some(path) = &config.export_residuals {
        let tmp = stage(path, staged);
        crate::io::write_residuals_csv(&tmp, &run.samples, &run.selection.best.fit)?;
    }
    Ok(())
}

/// Register `dest` and return the staging path to write it to.
fn stage<'a>(dest: &'a Path, staged: &mut Vec<(PathBuf, &'a Path)>) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".partial");
    let tmp = dest.with_file_name(name);
    staged.push((tmp.clone(), dest));
    tmp
}

fn discard(staged: &[(PathBuf, &Path)]) {
    for (tmp, _) in staged {
        let _ = fs::remove_file(tmp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    use crate::domain::{Conversion, ModelKind, RescaleTarget, Rounding, TableEntry, ZeroFilter};

    fn quadratic_table(max_key: u32) -> CalibrationTable {
        let values: Vec<f64> = (0..=max_key)
            .map(|k| {
                let x = f64::from(k);
                (0.01 * x * x + 2.0 * x + 5.0).round()
            })
            .collect();
        CalibrationTable::from_dense(&values).unwrap()
    }

    #[test]
    fn converts_then_fits() {
        let mut config = PipelineConfig::new("bench.json");
        config.conversion = Some(Conversion {
            factor: 3.6,
            rounding: Rounding::HalfAwayFromZero,
        });
        let run = run_with_table("bench.json", quadratic_table(200), &config).unwrap();

        // x=100: 0.01*1e4 + 200 + 5 = 305 -> *3.6 = 1098
        assert_eq!(run.table.get(100.0), Some(1098.0));
        assert_eq!(run.stats.n_entries, 201);
        // Key 0 carries a non-zero value, so the default filter keeps it.
        assert_eq!(run.samples.len(), 201);
        assert!(run.selection.best.fit.r_squared > 0.999);
        assert!(run.selection.best.fit.model.is_polynomial());
    }

    #[test]
    fn rescale_domain_gap_aborts() {
        let mut entries: Vec<TableEntry> = quadratic_table(16).entries().to_vec();
        entries.retain(|e| e.key != 7.0);
        let table = CalibrationTable::new(entries).unwrap();

        let mut config = PipelineConfig::new("gappy.json");
        config.rescale = Some(RescaleTarget { old_max: 16, new_max: 8 });

        let err = run_with_table("gappy.json", table, &config).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::DomainGap {
                stage: "rescale",
                key: 7,
                max: 16
            }
        );
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn all_zero_table_has_no_candidates() {
        let table = CalibrationTable::from_dense(&[0.0; 8]).unwrap();
        let mut config = PipelineConfig::new("zeros.json");
        config.zero_filter = ZeroFilter::Either;
        let err = run_with_table("zeros.json", table, &config).unwrap_err();
        assert_eq!(err, CalibrationError::NoCandidates);
    }

    #[test]
    fn failed_write_leaves_no_outputs() {
        let tmp_dir = TempDir::new("maf_staged_outputs").unwrap();
        let mut config = PipelineConfig::new("bench.json");
        config.output_table = Some(tmp_dir.path().join("table.json"));
        config.report = Some(tmp_dir.path().join("missing").join("report.txt"));
        config.export_model = Some(tmp_dir.path().join("model.json"));

        let run = run_with_table("bench.json", quadratic_table(50), &config).unwrap();
        let generated = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let err = write_outputs(&config, &run, "report", generated).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let leftovers: Vec<_> = fs::read_dir(tmp_dir.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn outputs_replace_existing_files() {
        let tmp_dir = TempDir::new("maf_replace_outputs").unwrap();
        let table_path = tmp_dir.path().join("table.json");
        fs::write(&table_path, "stale").unwrap();
        let mut config = PipelineConfig::new("bench.json");
        config.output_table = Some(table_path.clone());

        let run = run_with_table("bench.json", quadratic_table(20), &config).unwrap();
        let generated = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        write_outputs(&config, &run, "report", generated).unwrap();

        assert_eq!(crate::io::load_table(&table_path).unwrap(), run.table);
        assert_eq!(fs::read_dir(tmp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn degree_range_limits_candidates() {
        let mut config = PipelineConfig::new("bench.json");
        config.degree_min = 2;
        config.degree_max = 3;
        let run = run_with_table("bench.json", quadratic_table(50), &config).unwrap();
        let attempted: Vec<ModelKind> = run.selection.results.iter().map(|r| r.model()).collect();
        assert_eq!(
            attempted,
            vec![ModelKind::Polynomial(2), ModelKind::Polynomial(3), ModelKind::Exponential, ModelKind::Power]
        );
    }
}
