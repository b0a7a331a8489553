//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - merges CLI flags over an optional config file
//! - runs convert/rescale/fit
//! - prints the report and writes optional outputs

use chrono::Local;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ConvertArgs, FitArgs, RescaleArgs};
use crate::domain::{CalibrationTable, Conversion, PipelineConfig, RescaleTarget, format_key};
use crate::error::AppError;
use crate::io::{ConfigFile, load_config_file, load_table, validate, write_table};

pub mod pipeline;

/// Key echoed by `maf convert` as a spot check.
const SAMPLE_KEY: f64 = 100.0;

/// Entry point for the `maf` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Convert(args) => handle_convert(args),
        Command::Rescale(args) => handle_rescale(args),
    }
}

/// Logs go to stderr so stdout stays clean for the report.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let file = match &args.config {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };
    let config = pipeline_config(&args, file)?;
    validate(&config)?;

    let run = pipeline::run_pipeline(&config)?;

    let generated = Local::now().naive_local();
    let report = crate::report::format_run_summary(&run.source, &run.stats, &run.selection, generated);
    println!("{report}");

    pipeline::write_outputs(&config, &run, &report, generated)?;
    Ok(())
}

fn handle_convert(args: ConvertArgs) -> Result<(), AppError> {
    let conversion = Conversion {
        factor: args.factor,
        rounding: args.rounding,
    };
    let mut config = PipelineConfig::new(args.input.clone());
    config.conversion = Some(conversion);
    validate(&config)?;

    let table = load_table(&args.input)?;
    let converted = crate::data::convert(&table, conversion.factor, conversion.rounding);
    write_table(&args.output, &converted)?;

    info!(entries = converted.len(), "table converted");
    println!("{}", sample_line(&table, &converted));
    Ok(())
}

fn handle_rescale(args: RescaleArgs) -> Result<(), AppError> {
    let table = load_table(&args.input)?;
    let rescaled = crate::data::rescale(&table, args.old_max, args.new_max)?;
    write_table(&args.output, &rescaled)?;

    info!(entries = rescaled.len(), "table rescaled");
    println!(
        "Rescaled {} entries (0..={}) to {} entries (0..={}); wrote {}",
        table.len(),
        args.old_max,
        rescaled.len(),
        args.new_max,
        args.output.display()
    );
    Ok(())
}

/// Resolve CLI flags over the config file over built-in defaults.
pub fn pipeline_config(args: &FitArgs, file: ConfigFile) -> Result<PipelineConfig, AppError> {
    let input = args
        .input
        .clone()
        .or(file.input)
        .ok_or_else(|| AppError::new(2, "No input table given (pass TABLE or set `input` in --config)."))?;

    let mut config = PipelineConfig::new(input);
    config.output_table = args.output.clone().or(file.output_table);
    config.report = args.report.clone().or(file.report);
    config.export_model = args.export_model.clone().or(file.export_model);
    config.export_residuals = args.export_residuals.clone().or(file.export_residuals);

    config.conversion = match (args.factor, file.convert) {
        (Some(factor), file_conv) => Some(Conversion {
            factor,
            rounding: args
                .rounding
                .or(file_conv.map(|c| c.rounding))
                .unwrap_or_default(),
        }),
        (None, Some(conv)) => Some(Conversion {
            rounding: args.rounding.unwrap_or(conv.rounding),
            ..conv
        }),
        (None, None) => None,
    };

    config.rescale = match (args.old_max, args.new_max) {
        (Some(old_max), Some(new_max)) => Some(RescaleTarget { old_max, new_max }),
        _ => file.rescale,
    };

    config.degree_min = args.degree_min.or(file.degree_min).unwrap_or(config.degree_min);
    config.degree_max = args.degree_max.or(file.degree_max).unwrap_or(config.degree_max);
    config.zero_filter = args.zero_filter.or(file.zero_filter).unwrap_or(config.zero_filter);

    if let Some(solver) = file.solver {
        config.solver = solver;
    }
    if let Some(n) = args.max_iterations {
        config.solver.max_iterations = n;
    }
    if let Some(tol) = args.tolerance {
        config.solver.tolerance = tol;
    }

    Ok(config)
}

/// Key 100 before and after conversion (the midpoint entry if the table has
/// no key 100), e.g. `Converted 1025 entries; sample: key 100 value 120 -> 432`.
fn sample_line(before: &CalibrationTable, after: &CalibrationTable) -> String {
    let idx = before
        .entries()
        .iter()
        .position(|e| e.key == SAMPLE_KEY)
        .unwrap_or(before.len() / 2);
    match (before.entries().get(idx), after.entries().get(idx)) {
        (Some(b), Some(a)) => format!(
            "Converted {} entries; sample: key {} value {} -> {}",
            after.len(),
            format_key(b.key),
            format_key(b.value),
            format_key(a.value)
        ),
        _ => format!("Converted {} entries", after.len()),
    }
}
