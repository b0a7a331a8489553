//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the calibration table and fitting samples (`CalibrationTable`, `Sample`)
//! - candidate families and fit outcomes (`ModelKind`, `FitResult`, `SelectedModel`)
//! - run configuration (`PipelineConfig`)

pub mod types;

pub use types::*;
