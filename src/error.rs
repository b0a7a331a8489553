//! Error types.
//!
//! Two layers:
//!
//! - `CalibrationError`: typed failures of the calibration pipeline itself
//!   (table format, domain gaps, per-candidate fit failures, empty selection).
//! - `AppError`: what the binary reports, an exit code plus a message.
//!
//! Per-candidate failures (`FitNotConverged`, `DegenerateFit`) are carried inside
//! `FitResult::NotConverged` and never abort a run on their own.

use thiserror::Error;

use crate::domain::ModelKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("format error at key '{key}': {message}")]
    Format { key: String, message: String },

    #[error("calibration table is empty")]
    EmptyTable,

    #[error("domain gap in {stage}: key {key} is missing from the dense range 0..={max}")]
    DomainGap {
        stage: &'static str,
        key: u32,
        max: u32,
    },

    #[error("{model} did not converge: {reason}")]
    FitNotConverged { model: ModelKind, reason: String },

    #[error("{model} is degenerate: all sample values are identical but residuals are non-zero")]
    DegenerateFit { model: ModelKind },

    #[error("no candidate model converged")]
    NoCandidates,
}

impl CalibrationError {
    pub fn format(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn not_converged(model: ModelKind, reason: impl Into<String>) -> Self {
        Self::FitNotConverged {
            model,
            reason: reason.into(),
        }
    }

    /// Exit code used when this error aborts the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Format { .. } | Self::EmptyTable => 2,
            Self::DomainGap { .. } => 3,
            Self::FitNotConverged { .. } | Self::DegenerateFit { .. } | Self::NoCandidates => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<CalibrationError> for AppError {
    fn from(err: CalibrationError) -> Self {
        Self::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_errors_map_to_input_exit_code() {
        let err: AppError = CalibrationError::format("12", "value is not numeric").into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("'12'"));

        let err: AppError = CalibrationError::EmptyTable.into();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn domain_gap_names_stage_and_key() {
        let err = CalibrationError::DomainGap {
            stage: "rescale",
            key: 7,
            max: 1024,
        };
        assert_eq!(err.exit_code(), 3);
        let text = err.to_string();
        assert!(text.contains("rescale"));
        assert!(text.contains("key 7"));
    }

    #[test]
    fn no_candidates_is_a_fit_failure() {
        let err: AppError = CalibrationError::NoCandidates.into();
        assert_eq!(err.exit_code(), 4);
    }
}
