//! Low-level fitting routines for a single candidate.
//!
//! Given samples `(x_i, y_i)`:
//!
//! - polynomials are solved directly as linear least squares
//! - exponential and power families are solved with bounded Levenberg–Marquardt
//!
//! Every routine returns a `FitResult`: a failed candidate is reported, never
//! propagated, so one bad family cannot abort the run.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::{ConvergedFit, FitResult, ModelKind, Sample, SolverSettings};
use crate::error::CalibrationError;
use crate::math::{levenberg_marquardt, r_squared, solve_least_squares};
use crate::models::{fill_design_row, fill_jacobian_row, predict};

/// Fit one candidate against the samples.
pub fn fit_candidate(model: ModelKind, samples: &[Sample], solver: &SolverSettings) -> FitResult {
    let outcome = match model {
        ModelKind::Polynomial(degree) => fit_polynomial(degree, samples),
        ModelKind::Exponential | ModelKind::Power => fit_nonlinear(model, samples, solver),
    };

    match outcome {
        Ok(fit) => {
            debug!(model = %model, r_squared = fit.r_squared, "candidate converged");
            FitResult::Converged(fit)
        }
        Err(reason) => {
            debug!(model = %model, %reason, "candidate dropped");
            FitResult::NotConverged { model, reason }
        }
    }
}

/// Least-squares polynomial of the given degree.
///
/// Requires strictly more samples than coefficients (`degree < n - 1`).
pub fn fit_polynomial(degree: u8, samples: &[Sample]) -> Result<ConvergedFit, CalibrationError> {
    let model = ModelKind::Polynomial(degree);
    let n = samples.len();
    let p = model.param_count();

    if n <= p {
        return Err(CalibrationError::not_converged(
            model,
            format!("rank-deficient system: {n} samples for {p} coefficients"),
        ));
    }

    let mut x = DMatrix::<f64>::zeros(n, p);
    let y = DVector::from_iterator(n, samples.iter().map(|s| s.y));
    let mut row = vec![0.0; p];
    for (i, s) in samples.iter().enumerate() {
        fill_design_row(s.x, &mut row);
        for j in 0..p {
            x[(i, j)] = row[j];
        }
    }

    let beta = solve_least_squares(&x, &y).map_err(|e| CalibrationError::not_converged(model, e.to_string()))?;
    finish(model, samples, beta.iter().copied().collect())
}

/// Exponential (`a e^(b x) + c`) or power (`a x^b + c`) fit.
///
/// The solver works on `u = x / scale` with `scale = max |x|` so the starting
/// guess and damping behave the same for ADC codes and millivolts alike.
/// Coefficients are converted back to raw `x` before scoring:
///
/// - exponential: `b = b_u / scale`
/// - power: `a = a_u / scale^b`
pub fn fit_nonlinear(
    model: ModelKind,
    samples: &[Sample],
    solver: &SolverSettings,
) -> Result<ConvergedFit, CalibrationError> {
    let n = samples.len();
    let p = model.param_count();
    if n <= p {
        return Err(CalibrationError::not_converged(
            model,
            format!("{n} samples for {p} parameters"),
        ));
    }
    if model == ModelKind::Power && samples.iter().any(|s| s.x < 0.0) {
        return Err(CalibrationError::not_converged(model, "power model requires non-negative x"));
    }

    let scale = samples.iter().map(|s| s.x.abs()).fold(0.0, f64::max);
    if scale == 0.0 {
        return Err(CalibrationError::not_converged(model, "all sample keys are zero"));
    }

    let us: Vec<f64> = samples.iter().map(|s| s.x / scale).collect();
    let ys: Vec<f64> = samples.iter().map(|s| s.y).collect();
    let p0 = starting_guess(model, &us, &ys);

    let solution = levenberg_marquardt(
        &us,
        &ys,
        &p0,
        solver,
        |u, params| predict(model, u, params),
        |u, params, out| fill_jacobian_row(model, u, params, out),
    )
    .map_err(|e| CalibrationError::not_converged(model, e.to_string()))?;

    debug!(model = %model, iterations = solution.iterations, sse = solution.sse, "solver finished");

    let [a, b, c] = [solution.params[0], solution.params[1], solution.params[2]];
    let coefficients = match model {
        ModelKind::Exponential => vec![a, b / scale, c],
        _ => vec![a / scale.powf(b), b, c],
    };
    finish(model, samples, coefficients)
}

/// Deterministic starting point through the first and last samples with `b = 1`.
fn starting_guess(model: ModelKind, us: &[f64], ys: &[f64]) -> Vec<f64> {
    let (u0, u1) = (us[0], us[us.len() - 1]);
    let (y0, y1) = (ys[0], ys[ys.len() - 1]);

    let (g0, g1) = match model {
        ModelKind::Exponential => (u0.exp(), u1.exp()),
        _ => (u0, u1),
    };
    let a = if g1 != g0 { (y1 - y0) / (g1 - g0) } else { 1.0 };
    let c = y0 - a * g0;
    vec![a, 1.0, c]
}

/// Score coefficients against the samples and package the result.
fn finish(model: ModelKind, samples: &[Sample], coefficients: Vec<f64>) -> Result<ConvergedFit, CalibrationError> {
    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(CalibrationError::not_converged(model, "non-finite coefficients"));
    }

    let fitted_values: Vec<f64> = samples.iter().map(|s| predict(model, s.x, &coefficients)).collect();
    if fitted_values.iter().any(|v| !v.is_finite()) {
        return Err(CalibrationError::not_converged(model, "non-finite prediction"));
    }

    let observed: Vec<f64> = samples.iter().map(|s| s.y).collect();
    let r_squared = r_squared(&observed, &fitted_values).ok_or(CalibrationError::DegenerateFit { model })?;
    if !r_squared.is_finite() {
        return Err(CalibrationError::not_converged(model, "R² is not finite"));
    }

    Ok(ConvergedFit {
        model,
        coefficients,
        r_squared,
        fitted_values,
    })
}
