//! Optional TOML run configuration.
//!
//! A config file pins the settings for one sensor so repeated runs do not depend
//! on remembering CLI flags:
//!
//! ```toml
//! input = "mafData.json"
//! output_table = "mafData_kgh_500.json"
//! degree_max = 6
//! zero_filter = "either"
//!
//! [convert]
//! factor = 3.6
//! rounding = "half-away-from-zero"
//!
//! [rescale]
//! old_max = 1024
//! new_max = 500
//!
//! [solver]
//! max_iterations = 400
//! ```
//!
//! Every field is optional; CLI flags override the file and built-in defaults
//! fill whatever neither sets.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{
    Conversion, MAX_POLY_DEGREE, PipelineConfig, RescaleTarget, SolverSettings, ZeroFilter,
};
use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub input: Option<PathBuf>,
    pub output_table: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub export_model: Option<PathBuf>,
    pub export_residuals: Option<PathBuf>,
    pub convert: Option<Conversion>,
    pub rescale: Option<RescaleTarget>,
    pub degree_min: Option<u8>,
    pub degree_max: Option<u8>,
    pub zero_filter: Option<ZeroFilter>,
    pub solver: Option<SolverSettings>,
}

/// Parse a config file's text.
pub fn parse_config(text: &str) -> Result<ConfigFile, AppError> {
    toml::from_str(text).map_err(|e| AppError::new(2, format!("Invalid config: {e}")))
}

/// Read and parse a config file.
pub fn load_config_file(path: &Path) -> Result<ConfigFile, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read config '{}': {e}", path.display())))?;
    parse_config(&text).map_err(|e| AppError::new(2, format!("{} ({})", e.message(), path.display())))
}

/// Check a resolved configuration before any file is touched.
pub fn validate(config: &PipelineConfig) -> Result<(), AppError> {
    if config.degree_min < 1 || config.degree_max > MAX_POLY_DEGREE || config.degree_min > config.degree_max {
        return Err(AppError::new(
            2,
            format!(
                "Invalid degree range {}..={} (must lie within 1..={MAX_POLY_DEGREE}).",
                config.degree_min, config.degree_max
            ),
        ));
    }
    if let Some(conv) = &config.conversion {
        if !conv.factor.is_finite() || conv.factor == 0.0 {
            return Err(AppError::new(2, format!("Invalid conversion factor {}.", conv.factor)));
        }
    }
    if config.solver.max_iterations == 0 {
        return Err(AppError::new(2, "Solver max_iterations must be > 0."));
    }
    if !(config.solver.tolerance.is_finite() && config.solver.tolerance > 0.0) {
        return Err(AppError::new(2, "Solver tolerance must be positive."));
    }
    Ok(())
}
