//! Coefficient literals and formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - what gets pasted into firmware source is defined by exactly one function

use chrono::NaiveDateTime;

use crate::domain::{
    CoefficientLiteral, ConvergedFit, DatasetStats, FIRMWARE_COEFFICIENTS, FitResult, ModelKind,
    SelectedModel,
};
use crate::fit::selection::FitSelection;

/// Fractional digits of every exported coefficient.
pub const COEFFICIENT_PRECISION: usize = 6;

/// Render a fit's coefficients as fixed-precision literals.
///
/// Polynomials are labeled `c0..cn` lowest power first; exponential and power
/// fits are labeled `a, b, c`.
pub fn format_coefficients(fit: &ConvergedFit) -> Vec<CoefficientLiteral> {
    fit.coefficients
        .iter()
        .enumerate()
        .map(|(i, &value)| CoefficientLiteral {
            label: coefficient_label(fit.model, i),
            value,
            literal: fmt_coeff(value),
        })
        .collect()
}

fn coefficient_label(model: ModelKind, i: usize) -> String {
    match model {
        ModelKind::Polynomial(_) => format!("c{i}"),
        ModelKind::Exponential | ModelKind::Power => ["a", "b", "c"].get(i).map_or_else(|| format!("p{i}"), |s| s.to_string()),
    }
}

/// Human-readable equation, highest power first.
pub fn equation_text(selected: &SelectedModel) -> String {
    let lit = |i: usize| selected.literals[i].literal.as_str();
    match selected.fit.model {
        ModelKind::Polynomial(_) => {
            let terms: Vec<String> = selected
                .literals
                .iter()
                .enumerate()
                .rev()
                .map(|(i, l)| match i {
                    0 => l.literal.clone(),
                    1 => format!("{}x", l.literal),
                    _ => format!("{}x^{i}", l.literal),
                })
                .collect();
            format!("y = {}", terms.join(" + "))
        }
        ModelKind::Exponential => format!("y = {}e^({}x) + {}", lit(0), lit(1), lit(2)),
        ModelKind::Power => format!("y = {}x^{} + {}", lit(0), lit(1), lit(2)),
    }
}

/// C declarations, one per coefficient: `float c0 = 1.234567f;`.
pub fn format_c_declarations(selected: &SelectedModel) -> String {
    let mut out = String::new();
    for l in &selected.literals {
        out.push_str(&format!("float {} = {}f;\n", l.label, l.literal));
    }
    out
}

/// Polynomial coefficients as one firmware table row, zero-padded to the
/// evaluator's fixed coefficient count: `{c0f, c1f, ..., c6f}`.
///
/// `None` for the nonlinear families, which the polynomial evaluator cannot use.
pub fn format_firmware_row(selected: &SelectedModel) -> Option<String> {
    if !selected.fit.model.is_polynomial() {
        return None;
    }
    let mut terms: Vec<String> = selected.literals.iter().map(|l| format!("{}f", l.literal)).collect();
    while terms.len() < FIRMWARE_COEFFICIENTS {
        terms.push(format!("{}f", fmt_coeff(0.0)));
    }
    Some(format!("{{{}}}", terms.join(", ")))
}

/// Format the full run summary (dataset stats + per-candidate diagnostics + chosen model).
pub fn format_run_summary(
    source: &str,
    stats: &DatasetStats,
    selection: &FitSelection,
    generated: NaiveDateTime,
) -> String {
    let mut out = String::new();

    out.push_str("=== maf - MAF Transfer Function Fit ===\n");
    out.push_str(&format!("Generated: {}\n", generated.format("%Y-%m-%d %H:%M:%S")));
    out.push_str(&format!("Input: {source}\n"));
    out.push_str(&format!(
        "Table: n={} | samples={} | x=[{:.3}, {:.3}] | y=[{:.3}, {:.3}]\n",
        stats.n_entries, stats.n_samples, stats.x_min, stats.x_max, stats.y_min, stats.y_max
    ));

    out.push_str("\nModel diagnostics:\n");
    for result in &selection.results {
        match result {
            FitResult::Converged(fit) => {
                let chosen = if fit.model == selection.best.fit.model { "*" } else { " " };
                out.push_str(&format!(
                    "{chosen} {:<24} R²={:.6}\n",
                    fit.model.display_name(),
                    fit.r_squared
                ));
            }
            FitResult::NotConverged { model, reason } => {
                out.push_str(&format!("  {:<24} (dropped) {reason}\n", model.display_name()));
            }
        }
    }

    let best = &selection.best;
    out.push_str(&format!("\nBest fit type: {}\n", best.fit.model.display_name()));
    out.push_str(&format!("R² value: {:.6}\n", best.fit.r_squared));
    out.push_str(&format!("Equation: {}\n", equation_text(best)));

    match best.fit.model {
        ModelKind::Polynomial(_) => out.push_str("\nPolynomial coefficients (lowest to highest order):\n"),
        _ => out.push_str("\nFunction coefficients (a, b, c):\n"),
    }
    out.push_str(&format_c_declarations(best));

    if let Some(row) = format_firmware_row(best) {
        out.push_str(&format!("\nFirmware coefficient row ({FIRMWARE_COEFFICIENTS} terms):\n"));
        out.push_str(&row);
        out.push('\n');
    }

    out
}

fn fmt_coeff(v: f64) -> String {
    format!("{v:.prec$}", prec = COEFFICIENT_PRECISION)
}
