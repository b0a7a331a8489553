//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - fit each candidate family (polynomial degrees, exponential, power)
//! - evaluate candidates in parallel
//! - select the best model by R² with a deterministic tie-break

pub mod fitter;
pub mod selection;

pub use fitter::*;
pub use selection::*;
