//! Model evaluation for the calibration families.
//!
//! The fitters rely on three primitive operations:
//! - build a Vandermonde design row for a polynomial degree (for OLS)
//! - fill the Jacobian row `∂f/∂(a, b, c)` for the nonlinear families (for LM)
//! - predict `y(x)` given a model kind and its coefficients
//!
//! Coefficient layout matches what is exported to firmware:
//! - polynomial: `[c0, c1, ..., cn]`, lowest power first
//! - exponential / power: `[a, b, c]`

use crate::domain::ModelKind;

/// Fill `out` with `[1, x, x^2, ...]`.
///
/// # Panics
/// Panics if `out` is empty.
pub fn fill_design_row(x: f64, out: &mut [f64]) {
    out[0] = 1.0;
    for k in 1..out.len() {
        out[k] = out[k - 1] * x;
    }
}

/// Predict `y(x)` for the given model kind.
pub fn predict(model: ModelKind, x: f64, coeffs: &[f64]) -> f64 {
    match model {
        // Horner.
        ModelKind::Polynomial(_) => coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c),
        ModelKind::Exponential => coeffs[0] * (coeffs[1] * x).exp() + coeffs[2],
        ModelKind::Power => coeffs[0] * power(x, coeffs[1]) + coeffs[2],
    }
}

/// Fill the Jacobian row of a three-parameter family at `x`.
///
/// Polynomials are linear in their coefficients and never reach here.
pub fn fill_jacobian_row(model: ModelKind, x: f64, p: &[f64], out: &mut [f64]) {
    match model {
        ModelKind::Exponential => {
            let e = (p[1] * x).exp();
            out[0] = e;
            out[1] = p[0] * x * e;
            out[2] = 1.0;
        }
        ModelKind::Power => {
            let xb = power(x, p[1]);
            out[0] = xb;
            // d/db x^b = x^b ln x, which tends to 0 as x -> 0 for b > 0.
            out[1] = if x == 0.0 { 0.0 } else { p[0] * xb * x.ln() };
            out[2] = 1.0;
        }
        ModelKind::Polynomial(_) => {
            fill_design_row(x, out);
        }
    }
}

/// `x^b` with `0^b = 0` for positive `b`.
fn power(x: f64, b: f64) -> f64 {
    if x == 0.0 && b > 0.0 {
        return 0.0;
    }
    x.powf(b)
}
