//! Goodness-of-fit statistics.

/// Arithmetic mean. `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sum of squared residuals `Σ (y_i - ŷ_i)^2`.
pub fn sse(observed: &[f64], fitted: &[f64]) -> f64 {
    observed
        .iter()
        .zip(fitted)
        .map(|(y, f)| (y - f) * (y - f))
        .sum()
}

/// Coefficient of determination `R² = 1 - SS_res / SS_tot`.
///
/// When all observations are identical (`SS_tot = 0`) the ratio is undefined:
/// a zero-residual fit scores exactly 1, anything else returns `None`.
pub fn r_squared(observed: &[f64], fitted: &[f64]) -> Option<f64> {
    let y_mean = mean(observed);
    let ss_res = sse(observed, fitted);
    let ss_tot: f64 = observed.iter().map(|y| (y - y_mean) * (y - y_mean)).sum();

    if ss_tot == 0.0 {
        return (ss_res == 0.0).then_some(1.0);
    }
    Some(1.0 - ss_res / ss_tot)
}
