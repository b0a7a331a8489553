//! Pointwise unit conversion of table values.
//!
//! Typical use: bench tables recorded in mg/s converted to kg/h (`factor = 3.6`).

use crate::domain::{CalibrationTable, Rounding};

/// Milligrams per second to kilograms per hour.
pub const MGS_TO_KGH: f64 = 3.6;

/// Multiply every value by `factor` and round. Keys are preserved.
pub fn convert(table: &CalibrationTable, factor: f64, rounding: Rounding) -> CalibrationTable {
    table.map_values(|v| rounding.apply(v * factor))
}
