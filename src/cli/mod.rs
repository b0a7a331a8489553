//! Command-line parsing for the MAF calibration fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! table transforms and fitting code.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::data::MGS_TO_KGH;
use crate::domain::{Rounding, ZeroFilter};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "maf", version, about = "MAF sensor calibration table fitter")]
pub struct Cli {
    /// Log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit candidate transfer functions to a table and print firmware coefficients.
    Fit(FitArgs),
    /// Convert table values by a constant factor (default mg/s -> kg/h).
    Convert(ConvertArgs),
    /// Resample a dense table onto a new key range.
    Rescale(RescaleArgs),
}

/// Options for the full fit pipeline.
///
/// Everything except `--config` is optional so a config file can supply it;
/// flags given here override the file.
#[derive(Debug, Parser, Clone, Default)]
pub struct FitArgs {
    /// Calibration table (JSON object of key -> value).
    #[arg(value_name = "TABLE")]
    pub input: Option<PathBuf>,

    /// TOML config file.
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Multiply values by this factor before fitting.
    #[arg(long)]
    pub factor: Option<f64>,

    /// Rounding applied after `--factor`.
    #[arg(long, value_enum)]
    pub rounding: Option<Rounding>,

    /// Rescale from a dense `0..=old_max` domain (requires `--new-max`).
    #[arg(long, requires = "new_max")]
    pub old_max: Option<u32>,

    /// Rescale onto `0..=new_max` (requires `--old-max`).
    #[arg(long, requires = "old_max")]
    pub new_max: Option<u32>,

    /// Lowest polynomial degree to try.
    #[arg(long)]
    pub degree_min: Option<u8>,

    /// Highest polynomial degree to try (at most 6).
    #[arg(long)]
    pub degree_max: Option<u8>,

    /// Which zero entries to drop before fitting.
    #[arg(long, value_enum)]
    pub zero_filter: Option<ZeroFilter>,

    /// Iteration cap for the exponential/power solver.
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Relative convergence tolerance for the exponential/power solver.
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Write the converted/rescaled table to this JSON file.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Also write the report to this file.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Export the selected model (kind, R², coefficients) to JSON.
    #[arg(long = "export-model")]
    pub export_model: Option<PathBuf>,

    /// Export per-sample fitted values and residuals to CSV.
    #[arg(long = "export-residuals")]
    pub export_residuals: Option<PathBuf>,
}

/// Options for a standalone unit conversion.
#[derive(Debug, Parser, Clone)]
pub struct ConvertArgs {
    /// Source table.
    pub input: PathBuf,

    /// Destination table.
    pub output: PathBuf,

    /// Conversion factor applied to every value.
    #[arg(long, default_value_t = MGS_TO_KGH)]
    pub factor: f64,

    /// Rounding applied after conversion.
    #[arg(long, value_enum, default_value_t = Rounding::HalfAwayFromZero)]
    pub rounding: Rounding,
}

/// Options for a standalone domain rescale.
#[derive(Debug, Parser, Clone)]
pub struct RescaleArgs {
    /// Source table, densely keyed `0..=old_max`.
    pub input: PathBuf,

    /// Destination table, keyed `0..=new_max`.
    pub output: PathBuf,

    /// Largest key of the source domain.
    #[arg(long, default_value_t = 1024)]
    pub old_max: u32,

    /// Largest key of the resampled domain.
    #[arg(long, default_value_t = 500)]
    pub new_max: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fit_flags() {
        let cli = Cli::parse_from([
            "maf", "-vv", "fit", "maf.json", "--factor", "3.6", "--old-max", "1024", "--new-max", "500",
            "--zero-filter", "either",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.input, Some(PathBuf::from("maf.json")));
        assert_eq!(args.factor, Some(3.6));
        assert_eq!(args.old_max, Some(1024));
        assert_eq!(args.new_max, Some(500));
        assert_eq!(args.zero_filter, Some(ZeroFilter::Either));
    }

    #[test]
    fn rescale_bounds_must_come_together() {
        assert!(Cli::try_parse_from(["maf", "fit", "maf.json", "--old-max", "1024"]).is_err());
    }

    #[test]
    fn convert_defaults_to_mgs_to_kgh() {
        let cli = Cli::parse_from(["maf", "convert", "in.json", "out.json"]);
        let Command::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.factor, 3.6);
        assert_eq!(args.rounding, Rounding::HalfAwayFromZero);
    }
}
