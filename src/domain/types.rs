//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - passed between pipeline stages by value (no stage mutates its input)
//! - exported to JSON for downstream tooling
//! - configured from the CLI or a TOML file

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// Highest polynomial degree the firmware evaluator supports.
pub const MAX_POLY_DEGREE: u8 = 6;

/// Number of coefficients in a firmware polynomial row (`c0..c6`).
pub const FIRMWARE_COEFFICIENTS: usize = MAX_POLY_DEGREE as usize + 1;

/// One `(key, value)` entry of a calibration table.
///
/// `key` is the raw sensor domain (ADC code, millivolts, ...), `value` the measured
/// flow in whatever engineering unit the table carries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub key: f64,
    pub value: f64,
}

/// An immutable calibration table, sorted ascending by key.
///
/// Invariants (checked in [`CalibrationTable::new`]):
/// - at least one entry
/// - keys are finite, non-negative and unique
/// - values are finite
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    entries: Vec<TableEntry>,
}

impl CalibrationTable {
    pub fn new(mut entries: Vec<TableEntry>) -> Result<Self, CalibrationError> {
        if entries.is_empty() {
            return Err(CalibrationError::EmptyTable);
        }
        for e in &entries {
            if !e.key.is_finite() || e.key < 0.0 {
                return Err(CalibrationError::format(
                    format_key(e.key),
                    "key must be a finite, non-negative number",
                ));
            }
            if !e.value.is_finite() {
                return Err(CalibrationError::format(
                    format_key(e.key),
                    "value must be a finite number",
                ));
            }
        }

        entries.sort_by(|a, b| a.key.total_cmp(&b.key));
        if let Some(dup) = entries.windows(2).find(|w| w[0].key == w[1].key) {
            return Err(CalibrationError::format(
                format_key(dup[1].key),
                "duplicate key",
            ));
        }

        Ok(Self { entries })
    }

    /// Build a dense table keyed `0..values.len()`.
    pub fn from_dense(values: &[f64]) -> Result<Self, CalibrationError> {
        let entries = values
            .iter()
            .enumerate()
            .map(|(i, &value)| TableEntry {
                key: i as f64,
                value,
            })
            .collect();
        Self::new(entries)
    }

    /// New table with the same keys and transformed values.
    ///
    /// `f` must map finite values to finite values; callers validate their
    /// parameters (e.g. a finite conversion factor) up front.
    pub(crate) fn map_values(&self, f: impl Fn(f64) -> f64) -> CalibrationTable {
        let entries = self
            .entries
            .iter()
            .map(|e| TableEntry {
                key: e.key,
                value: f(e.value),
            })
            .collect();
        CalibrationTable { entries }
    }

    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed table; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the value stored under `key`.
    pub fn get(&self, key: f64) -> Option<f64> {
        self.entries
            .binary_search_by(|e| e.key.total_cmp(&key))
            .ok()
            .map(|idx| self.entries[idx].value)
    }

    /// Extract fitting samples, dropping degenerate zero entries per `filter`.
    pub fn samples(&self, filter: ZeroFilter) -> Vec<Sample> {
        self.entries
            .iter()
            .map(|e| Sample { x: e.key, y: e.value })
            .filter(|s| filter.keeps(s))
            .collect()
    }

    pub fn value_range(&self) -> (f64, f64) {
        min_max(self.entries.iter().map(|e| e.value))
    }
}

/// A single `(x, y)` observation handed to the fitters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
}

/// Which zero entries are excluded before fitting.
///
/// Calibration tables usually start with a `0 -> 0` row (sensor off). Left in, it
/// drags low-order polynomials and breaks power-law fits at `x = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ZeroFilter {
    /// Drop entries where both key and value are zero.
    #[default]
    Both,
    /// Drop entries where either key or value is zero.
    Either,
    /// Keep everything.
    None,
}

impl ZeroFilter {
    pub fn keeps(self, s: &Sample) -> bool {
        match self {
            ZeroFilter::Both => !(s.x == 0.0 && s.y == 0.0),
            ZeroFilter::Either => s.x != 0.0 && s.y != 0.0,
            ZeroFilter::None => true,
        }
    }
}

/// Rounding applied after a value transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Rounding {
    /// Round to the nearest integer, ties away from zero.
    #[default]
    HalfAwayFromZero,
    /// Keep the real value.
    None,
}

impl Rounding {
    pub fn apply(self, v: f64) -> f64 {
        match self {
            // `f64::round` rounds half-way cases away from zero.
            Rounding::HalfAwayFromZero => v.round(),
            Rounding::None => v,
        }
    }
}

/// Candidate model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// `y = c0 + c1 x + ... + cn x^n`
    Polynomial(u8),
    /// `y = a e^(b x) + c`
    Exponential,
    /// `y = a x^b + c`
    Power,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> String {
        match self {
            ModelKind::Polynomial(d) => format!("Polynomial (degree {d})"),
            ModelKind::Exponential => "Exponential".to_string(),
            ModelKind::Power => "Power".to_string(),
        }
    }

    /// Number of fitted coefficients.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Polynomial(d) => d as usize + 1,
            ModelKind::Exponential | ModelKind::Power => 3,
        }
    }

    pub fn is_polynomial(self) -> bool {
        matches!(self, ModelKind::Polynomial(_))
    }

    /// Candidate list in declaration order: polynomials by ascending degree, then
    /// exponential, then power.
    pub fn candidates(degree_min: u8, degree_max: u8) -> Vec<ModelKind> {
        let mut out: Vec<ModelKind> = (degree_min..=degree_max).map(ModelKind::Polynomial).collect();
        out.push(ModelKind::Exponential);
        out.push(ModelKind::Power);
        out
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// A candidate that produced usable coefficients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergedFit {
    pub model: ModelKind,
    /// Polynomial: lowest to highest power. Exponential/Power: `[a, b, c]`.
    pub coefficients: Vec<f64>,
    pub r_squared: f64,
    #[serde(skip)]
    pub fitted_values: Vec<f64>,
}

/// Outcome of attempting one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum FitResult {
    Converged(ConvergedFit),
    NotConverged {
        model: ModelKind,
        reason: CalibrationError,
    },
}

impl FitResult {
    pub fn model(&self) -> ModelKind {
        match self {
            FitResult::Converged(fit) => fit.model,
            FitResult::NotConverged { model, .. } => *model,
        }
    }

    pub fn converged(&self) -> Option<&ConvergedFit> {
        match self {
            FitResult::Converged(fit) => Some(fit),
            FitResult::NotConverged { .. } => None,
        }
    }
}

/// One coefficient rendered for embedding in firmware source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientLiteral {
    pub label: String,
    pub value: f64,
    /// Fixed six-decimal rendering, e.g. `-0.000751`.
    pub literal: String,
}

/// The winning candidate plus its formatted literals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedModel {
    pub fit: ConvergedFit,
    pub literals: Vec<CoefficientLiteral>,
}

/// Summary stats about the table and the samples actually fitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStats {
    pub n_entries: usize,
    pub n_samples: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl DatasetStats {
    pub fn compute(table: &CalibrationTable, samples: &[Sample]) -> Self {
        let (x_min, x_max) = min_max(samples.iter().map(|s| s.x));
        let (y_min, y_max) = min_max(samples.iter().map(|s| s.y));
        Self {
            n_entries: table.len(),
            n_samples: samples.len(),
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }
}

/// Unit conversion step: `value * factor`, then rounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub factor: f64,
    #[serde(default)]
    pub rounding: Rounding,
}

/// Domain rescale step: resample a dense `0..=old_max` table onto `0..=new_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescaleTarget {
    pub old_max: u32,
    pub new_max: u32,
}

/// Bounds for the nonlinear solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub max_iterations: usize,
    /// Relative tolerance on SSE decrease and step size.
    pub tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// Derived from CLI flags, an optional TOML file, and defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub input: PathBuf,
    /// Write the converted/rescaled table here.
    pub output_table: Option<PathBuf>,
    /// Write the text report here (it is always printed to stdout as well).
    pub report: Option<PathBuf>,
    /// Write the selected model as JSON here.
    pub export_model: Option<PathBuf>,
    /// Write per-sample fitted values and residuals as CSV here.
    pub export_residuals: Option<PathBuf>,

    pub conversion: Option<Conversion>,
    pub rescale: Option<RescaleTarget>,

    pub degree_min: u8,
    pub degree_max: u8,
    pub zero_filter: ZeroFilter,
    pub solver: SolverSettings,
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_table: None,
            report: None,
            export_model: None,
            export_residuals: None,
            conversion: None,
            rescale: None,
            degree_min: 1,
            degree_max: MAX_POLY_DEGREE,
            zero_filter: ZeroFilter::Both,
            solver: SolverSettings::default(),
        }
    }

    pub fn candidates(&self) -> Vec<ModelKind> {
        ModelKind::candidates(self.degree_min, self.degree_max)
    }
}

/// Render a key the way calibration files spell it: `"100"`, not `"100.0"`.
pub fn format_key(key: f64) -> String {
    if key.fract() == 0.0 && key.abs() < 9.0e15 {
        format!("{}", key as i64)
    } else {
        format!("{key}")
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
