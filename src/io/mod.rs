//! Input/output helpers.
//!
//! - calibration table JSON read/write (`table`)
//! - TOML run configuration (`config`)
//! - residual CSV export (`export`)
//! - selected model JSON (`model`)

pub mod config;
pub mod export;
pub mod model;
pub mod table;

pub use config::*;
pub use export::*;
pub use model::*;
pub use table::*;
