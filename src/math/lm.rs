//! Bounded Levenberg–Marquardt solver for small nonlinear least-squares problems.
//!
//! Minimizes `Σ (y_i - f(x_i; p))^2` over a parameter vector `p` (three parameters
//! for the calibration families). Each iteration solves the damped normal
//! equations
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr
//! ```
//!
//! accepting the step when the SSE decreases (λ shrinks) and retrying with more
//! damping otherwise (λ grows).
//!
//! Termination:
//! - converged when the relative SSE decrease or the relative step size falls
//!   below `tolerance`, or when damping saturates without finding a descent step
//! - `MaxIterations` after `max_iterations` outer iterations
//! - `Singular` when the damped system cannot be solved
//! - `NonFinite` when the starting point already evaluates to a non-finite SSE

use nalgebra::{DMatrix, DVector};

use crate::domain::SolverSettings;
use crate::math::SolveError;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e20;

/// Converged parameters plus diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct LmSolution {
    pub params: Vec<f64>,
    pub sse: f64,
    pub iterations: usize,
}

/// Run Levenberg–Marquardt from `p0`.
///
/// - `f(x, p)` evaluates the model
/// - `grad(x, p, out)` writes `∂f/∂p_j` into `out`
pub fn levenberg_marquardt<F, G>(
    xs: &[f64],
    ys: &[f64],
    p0: &[f64],
    settings: &SolverSettings,
    f: F,
    grad: G,
) -> Result<LmSolution, SolveError>
where
    F: Fn(f64, &[f64]) -> f64,
    G: Fn(f64, &[f64], &mut [f64]),
{
    let n = xs.len();
    let m = p0.len();
    let tol = settings.tolerance;

    let objective = |p: &[f64]| -> f64 { xs.iter().zip(ys).map(|(&x, &y)| (y - f(x, p)).powi(2)).sum() };

    let mut p = p0.to_vec();
    let mut sse = objective(&p);
    if !sse.is_finite() {
        return Err(SolveError::NonFinite);
    }

    let mut lambda = LAMBDA_INIT;
    let mut jac = DMatrix::<f64>::zeros(n, m);
    let mut resid = DVector::<f64>::zeros(n);
    let mut row = vec![0.0; m];

    for iter in 1..=settings.max_iterations {
        if sse == 0.0 {
            return Ok(LmSolution { params: p, sse, iterations: iter - 1 });
        }

        for i in 0..n {
            grad(xs[i], &p, &mut row);
            for j in 0..m {
                jac[(i, j)] = row[j];
            }
            resid[i] = ys[i] - f(xs[i], &p);
        }
        if jac.iter().any(|v| !v.is_finite()) {
            return Err(SolveError::NonFinite);
        }

        let jtj = jac.transpose() * &jac;
        let jtr = jac.transpose() * &resid;
        let p_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();

        // Inner loop: raise damping until a step reduces the SSE.
        loop {
            let mut damped = jtj.clone();
            for j in 0..m {
                damped[(j, j)] += lambda * jtj[(j, j)];
            }
            let delta = damped.lu().solve(&jtr).ok_or(SolveError::Singular)?;
            let step_norm = delta.norm();
            let step_small = step_norm <= tol * (p_norm + tol);

            let candidate: Vec<f64> = p.iter().zip(delta.iter()).map(|(a, d)| a + d).collect();
            let sse_new = objective(&candidate);

            if sse_new.is_finite() && sse_new < sse {
                let rel_decrease = (sse - sse_new) / sse;
                p = candidate;
                sse = sse_new;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                if rel_decrease <= tol || step_small {
                    return Ok(LmSolution { params: p, sse, iterations: iter });
                }
                break;
            }

            if step_small {
                return Ok(LmSolution { params: p, sse, iterations: iter });
            }
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                // No descent direction left at machine precision.
                return Ok(LmSolution { params: p, sse, iterations: iter });
            }
        }
    }

    Err(SolveError::MaxIterations(settings.max_iterations))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp_model(x: f64, p: &[f64]) -> f64 {
        p[0] * (p[1] * x).exp() + p[2]
    }

    fn exp_grad(x: f64, p: &[f64], out: &mut [f64]) {
        let e = (p[1] * x).exp();
        out[0] = e;
        out[1] = p[0] * x * e;
        out[2] = 1.0;
    }

    #[test]
    fn recovers_exponential_parameters() {
        let xs: Vec<f64> = (0..40).map(|i| i as f64 / 40.0).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| exp_model(x, &[2.0, 1.5, -1.0])).collect();

        let sol = levenberg_marquardt(&xs, &ys, &[1.0, 1.0, 0.0], &SolverSettings::default(), exp_model, exp_grad)
            .unwrap();
        assert!((sol.params[0] - 2.0).abs() < 1e-6, "a = {}", sol.params[0]);
        assert!((sol.params[1] - 1.5).abs() < 1e-6, "b = {}", sol.params[1]);
        assert!((sol.params[2] + 1.0).abs() < 1e-6, "c = {}", sol.params[2]);
    }

    #[test]
    fn iteration_cap_is_reported() {
        let xs: Vec<f64> = (0..40).map(|i| i as f64 / 40.0).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| exp_model(x, &[2.0, 1.5, -1.0])).collect();
        let settings = SolverSettings {
            max_iterations: 1,
            tolerance: 1e-15,
        };

        let err = levenberg_marquardt(&xs, &ys, &[1.0, 1.0, 0.0], &settings, exp_model, exp_grad).unwrap_err();
        assert_eq!(err, SolveError::MaxIterations(1));
    }

    #[test]
    fn zero_gradient_column_is_singular() {
        // With a = 0 the `b` column of the Jacobian vanishes.
        let xs = [0.1, 0.2, 0.3, 0.4];
        let ys = [1.0, 2.0, 3.0, 4.0];
        let err = levenberg_marquardt(&xs, &ys, &[0.0, 1.0, 0.0], &SolverSettings::default(), exp_model, exp_grad)
            .unwrap_err();
        assert_eq!(err, SolveError::Singular);
    }

    #[test]
    fn non_finite_start_is_rejected() {
        let xs = [1000.0, 2000.0];
        let ys = [1.0, 2.0];
        let err = levenberg_marquardt(&xs, &ys, &[1.0, 1.0, 0.0], &SolverSettings::default(), exp_model, exp_grad)
            .unwrap_err();
        assert_eq!(err, SolveError::NonFinite);
    }

    #[test]
    fn deterministic_across_runs() {
        let xs: Vec<f64> = (1..30).map(|i| i as f64 / 30.0).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 3.0 * (0.8 * x).exp() + 0.5 + 0.01 * (x * 17.0).sin()).collect();
        let a = levenberg_marquardt(&xs, &ys, &[1.0, 1.0, 0.0], &SolverSettings::default(), exp_model, exp_grad);
        let b = levenberg_marquardt(&xs, &ys, &[1.0, 1.0, 0.0], &SolverSettings::default(), exp_model, exp_grad);
        assert_eq!(a, b);
    }
}
