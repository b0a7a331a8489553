//! Candidate evaluation and best-model selection.
//!
//! Every candidate (all configured polynomial degrees, exponential, power) is
//! fitted; there is no early exit on a good score. Selection then picks the
//! maximum R² among converged candidates.
//!
//! Tie-break when scores agree within `R2_TIE_TOLERANCE`:
//! 1. polynomials before the nonlinear families
//! 2. fewer parameters (lower degree)
//! 3. declaration order

use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{
    ConvergedFit, FitResult, ModelKind, PipelineConfig, Sample, SelectedModel, SolverSettings,
};
use crate::error::CalibrationError;
use crate::fit::fitter::fit_candidate;
use crate::report::format_coefficients;

/// Absolute R² difference treated as a tie.
pub const R2_TIE_TOLERANCE: f64 = 1e-10;

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    pub best: SelectedModel,
    /// Every attempted candidate, in declaration order.
    pub results: Vec<FitResult>,
}

/// Fit every candidate independently (in parallel), preserving declaration order.
pub fn fit_all(samples: &[Sample], candidates: &[ModelKind], solver: &SolverSettings) -> Vec<FitResult> {
    candidates
        .par_iter()
        .map(|&model| fit_candidate(model, samples, solver))
        .collect()
}

/// Pick the best converged candidate.
pub fn select_best(results: &[FitResult]) -> Result<SelectedModel, CalibrationError> {
    let converged: Vec<(usize, &ConvergedFit)> = results
        .iter()
        .enumerate()
        .filter_map(|(idx, r)| r.converged().map(|fit| (idx, fit)))
        .collect();

    let best_r2 = converged
        .iter()
        .map(|(_, fit)| fit.r_squared)
        .fold(f64::NEG_INFINITY, f64::max);

    let best = converged
        .into_iter()
        .filter(|(_, fit)| best_r2 - fit.r_squared <= R2_TIE_TOLERANCE)
        .min_by_key(|(idx, fit)| (!fit.model.is_polynomial(), fit.model.param_count(), *idx))
        .map(|(_, fit)| fit.clone())
        .ok_or(CalibrationError::NoCandidates)?;

    let literals = format_coefficients(&best);
    Ok(SelectedModel { fit: best, literals })
}

/// Fit all candidates named by `config` and select the best.
pub fn fit_and_select(samples: &[Sample], config: &PipelineConfig) -> Result<FitSelection, CalibrationError> {
    let results = fit_all(samples, &config.candidates(), &config.solver);

    for r in &results {
        if let FitResult::NotConverged { reason, .. } = r {
            warn!(%reason, "candidate excluded");
        }
    }

    let best = select_best(&results)?;
    info!(model = %best.fit.model, r_squared = best.fit.r_squared, "selected model");

    Ok(FitSelection { best, results })
}
