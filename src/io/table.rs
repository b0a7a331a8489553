//! Calibration table JSON ingest and write-back.
//!
//! Tables are flat JSON objects mapping a numeric key (as a string) to a numeric
//! value:
//!
//! ```text
//! {
//!     "0": 0,
//!     "1": 177,
//!     "2": 181
//! }
//! ```
//!
//! Ingest is all-or-nothing: any non-numeric key/value, nested structure or
//! duplicate key rejects the whole table.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::domain::{CalibrationTable, TableEntry, format_key};
use crate::error::{AppError, CalibrationError};

/// Object members in document order, repeats included.
///
/// `serde_json::Value` keeps only the last of two identical keys, which would
/// silently drop a measurement.
struct RawEntries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RawEntriesVisitor)
    }
}

struct RawEntriesVisitor;

impl<'de> Visitor<'de> for RawEntriesVisitor {
    type Value = RawEntries;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a flat JSON object of key -> value")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            entries.push((key, value));
        }
        Ok(RawEntries(entries))
    }
}

/// Parse a calibration table from JSON text.
pub fn load(source: &str) -> Result<CalibrationTable, CalibrationError> {
    let RawEntries(members) = serde_json::from_str(source)
        .map_err(|e| CalibrationError::format("<document>", format!("invalid JSON: {e}")))?;

    if members.is_empty() {
        return Err(CalibrationError::EmptyTable);
    }

    let mut seen = HashSet::with_capacity(members.len());
    let mut entries = Vec::with_capacity(members.len());
    for (raw_key, raw_value) in &members {
        if !seen.insert(raw_key.as_str()) {
            return Err(CalibrationError::format(raw_key.as_str(), "duplicate key"));
        }
        let key = parse_number_str(raw_key)
            .ok_or_else(|| CalibrationError::format(raw_key.as_str(), "key is not numeric"))?;
        let value = match raw_value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_number_str(s),
            _ => None,
        }
        .ok_or_else(|| CalibrationError::format(raw_key.as_str(), "value is not numeric"))?;

        entries.push(TableEntry { key, value });
    }

    CalibrationTable::new(entries)
}

/// Read and parse a calibration table file.
pub fn load_table(path: &Path) -> Result<CalibrationTable, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read table '{}': {e}", path.display())))?;
    let table = load(&text).map_err(|e| {
        AppError::new(e.exit_code(), format!("Invalid table '{}': {e}", path.display()))
    })?;
    debug!(path = %path.display(), entries = table.len(), "table loaded");
    Ok(table)
}

/// Render a table as 4-space indented JSON in key order.
///
/// Integral values are written as JSON integers so a rounded table round-trips
/// to the same text the bench tools produce.
pub fn to_json(table: &CalibrationTable) -> Result<String, AppError> {
    let mut map = Map::with_capacity(table.len());
    for e in table.entries() {
        map.insert(format_key(e.key), number_value(e.value)?);
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    Value::Object(map)
        .serialize(&mut ser)
        .map_err(|e| AppError::new(2, format!("Failed to serialize table: {e}")))?;

    String::from_utf8(buf).map_err(|e| AppError::new(2, format!("Table JSON is not UTF-8: {e}")))
}

/// Write a table to `path`.
pub fn write_table(path: &Path, table: &CalibrationTable) -> Result<(), AppError> {
    let json = to_json(table)?;
    fs::write(path, json)
        .map_err(|e| AppError::new(2, format!("Failed to write table '{}': {e}", path.display())))?;
    debug!(path = %path.display(), entries = table.len(), "table written");
    Ok(())
}

fn parse_number_str(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn number_value(v: f64) -> Result<Value, AppError> {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        return Ok(Value::Number(Number::from(v as i64)));
    }
    Number::from_f64(v)
        .map(Value::Number)
        .ok_or_else(|| AppError::new(2, format!("Cannot write non-finite value {v}")))
}
