//! Export per-sample fit results to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets when checking how
//! the chosen transfer function tracks the bench table.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::{ConvergedFit, Sample};
use crate::error::AppError;

/// Write `x,y_obs,y_fit,residual` rows for every fitted sample.
pub fn write_residuals_csv(path: &Path, samples: &[Sample], fit: &ConvergedFit) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create residuals CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_residuals(&mut out, samples, fit)?;
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush residuals CSV: {e}")))
}

fn write_residuals(out: &mut impl Write, samples: &[Sample], fit: &ConvergedFit) -> Result<(), AppError> {
    if fit.fitted_values.len() != samples.len() {
        return Err(AppError::new(
            2,
            format!(
                "Residual export mismatch: {} samples but {} fitted values.",
                samples.len(),
                fit.fitted_values.len()
            ),
        ));
    }

    writeln!(out, "x,y_obs,y_fit,residual")
        .map_err(|e| AppError::new(2, format!("Failed to write residuals CSV header: {e}")))?;

    for (s, &y_fit) in samples.iter().zip(&fit.fitted_values) {
        writeln!(out, "{},{},{:.6},{:.6}", s.x, s.y, y_fit, s.y - y_fit)
            .map_err(|e| AppError::new(2, format!("Failed to write residuals CSV row: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;

    #[test]
    fn rows_follow_samples() {
        let samples = vec![Sample { x: 1.0, y: 3.0 }, Sample { x: 2.0, y: 5.5 }];
        let fit = ConvergedFit {
            model: ModelKind::Polynomial(1),
            coefficients: vec![1.0, 2.0],
            r_squared: 0.98,
            fitted_values: vec![3.0, 5.0],
        };

        let mut buf = Vec::new();
        write_residuals(&mut buf, &samples, &fit).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "x,y_obs,y_fit,residual\n1,3,3.000000,0.000000\n2,5.5,5.000000,0.500000\n"
        );
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let samples = vec![Sample { x: 1.0, y: 3.0 }];
        let fit = ConvergedFit {
            model: ModelKind::Polynomial(1),
            coefficients: vec![1.0, 2.0],
            r_squared: 1.0,
            fitted_values: Vec::new(),
        };
        assert!(write_residuals(&mut Vec::new(), &samples, &fit).is_err());
    }
}
