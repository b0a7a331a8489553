//! Write the selected transfer function as JSON.
//!
//! This is the machine-readable twin of the printed report: model kind,
//! raw coefficients, the six-decimal literals, R² and the table stats.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::{CoefficientLiteral, DatasetStats, ModelKind, SelectedModel};
use crate::error::AppError;

/// JSON schema of an exported model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelFile<'a> {
    pub tool: &'static str,
    pub generated: NaiveDateTime,
    pub source: &'a str,
    pub model: ModelKind,
    pub r_squared: f64,
    pub coefficients: &'a [f64],
    pub literals: &'a [CoefficientLiteral],
    pub stats: &'a DatasetStats,
}

impl<'a> ModelFile<'a> {
    pub fn new(selected: &'a SelectedModel, stats: &'a DatasetStats, source: &'a str, generated: NaiveDateTime) -> Self {
        Self {
            tool: "maf",
            generated,
            source,
            model: selected.fit.model,
            r_squared: selected.fit.r_squared,
            coefficients: &selected.fit.coefficients,
            literals: &selected.literals,
            stats,
        }
    }
}

/// Write a model JSON file.
pub fn write_model_json(
    path: &Path,
    selected: &SelectedModel,
    stats: &DatasetStats,
    source: &str,
    generated: NaiveDateTime,
) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create model JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, &ModelFile::new(selected, stats, source, generated))
        .map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    use crate::domain::ConvergedFit;
    use crate::report::format_coefficients;

    #[test]
    fn model_file_shape() {
        let fit = ConvergedFit {
            model: ModelKind::Polynomial(2),
            coefficients: vec![1.0, 0.5, 0.25],
            r_squared: 0.999,
            fitted_values: vec![1.0; 3],
        };
        let literals = format_coefficients(&fit);
        let selected = SelectedModel { fit, literals };
        let stats = DatasetStats {
            n_entries: 4,
            n_samples: 3,
            x_min: 1.0,
            x_max: 3.0,
            y_min: 1.0,
            y_max: 5.0,
        };
        let generated = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();

        let value: Value = serde_json::to_value(ModelFile::new(&selected, &stats, "maf.json", generated)).unwrap();
        assert_eq!(value["tool"], "maf");
        assert_eq!(value["model"], json!({ "polynomial": 2 }));
        assert_eq!(value["coefficients"], json!([1.0, 0.5, 0.25]));
        assert_eq!(value["literals"][2]["literal"], "0.250000");
        assert_eq!(value["stats"]["n_samples"], 3);
        assert_eq!(value["generated"], "2025-03-01T12:00:00");
    }
}
