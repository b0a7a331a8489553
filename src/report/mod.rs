//! Reporting: coefficient literals for firmware and the terminal run summary.

pub mod format;

pub use format::*;
