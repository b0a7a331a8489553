//! Domain rescaling by piecewise-linear resampling.
//!
//! A table densely keyed `0..=old_max` (e.g. a 10-bit ADC table, `old_max = 1024`)
//! is resampled onto `0..=new_max`. Each new index maps back to a fractional old
//! position and is linearly interpolated between its two neighbours, then rounded
//! half away from zero (rescaled tables carry integer flow values).
//!
//! The upper neighbour is clamped to `old_max`, so the last entry is held flat
//! rather than extrapolated.

use tracing::debug;

use crate::domain::CalibrationTable;
use crate::error::CalibrationError;

/// Resample a dense `0..=old_max` table onto `0..=new_max`.
pub fn rescale(table: &CalibrationTable, old_max: u32, new_max: u32) -> Result<CalibrationTable, CalibrationError> {
    let dense = dense_values(table, old_max)?;

    let mut values = Vec::with_capacity(new_max as usize + 1);
    for i in 0..=new_max {
        let old_position = old_position(i, old_max, new_max);
        let old_lower = (old_position.floor() as u32).min(old_max);
        let old_upper = (old_lower + 1).min(old_max);
        let fraction = old_position - f64::from(old_lower);

        let lo = dense[old_lower as usize];
        let hi = dense[old_upper as usize];
        values.push((lo + fraction * (hi - lo)).round());
    }

    debug!(old_max, new_max, "table rescaled");
    CalibrationTable::from_dense(&values)
}

/// Fractional position in the old domain for new index `i`.
///
/// Computed as `i * old_max / new_max` (multiply first) so that `new_max == old_max`
/// maps every index onto itself exactly.
fn old_position(i: u32, old_max: u32, new_max: u32) -> f64 {
    if new_max == 0 {
        return 0.0;
    }
    (f64::from(i) * f64::from(old_max)) / f64::from(new_max)
}

/// Collect values for keys `0..=old_max`, failing on the first missing key.
fn dense_values(table: &CalibrationTable, old_max: u32) -> Result<Vec<f64>, CalibrationError> {
    (0..=old_max)
        .map(|k| {
            table.get(f64::from(k)).ok_or(CalibrationError::DomainGap {
                stage: "rescale",
                key: k,
                max: old_max,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TableEntry;
    use proptest::prelude::*;

    fn linear_table(max: u32, slope: f64) -> CalibrationTable {
        let values: Vec<f64> = (0..=max).map(|k| (f64::from(k) * slope).round()).collect();
        CalibrationTable::from_dense(&values).unwrap()
    }

    #[test]
    fn downsample_1024_to_500_has_501_entries() {
        let t = linear_table(1024, 3.0);
        let out = rescale(&t, 1024, 500).unwrap();
        assert_eq!(out.len(), 501);
        let keys: Vec<f64> = out.entries().iter().map(|e| e.key).collect();
        let expected: Vec<f64> = (0..=500).map(f64::from).collect();
        assert_eq!(keys, expected);
        // Endpoints are preserved exactly.
        assert_eq!(out.get(0.0), Some(0.0));
        assert_eq!(out.get(500.0), t.get(1024.0));
    }

    #[test]
    fn upsample_interpolates_midpoints() {
        let t = CalibrationTable::from_dense(&[0.0, 10.0, 30.0]).unwrap();
        let out = rescale(&t, 2, 4).unwrap();
        let values: Vec<f64> = out.entries().iter().map(|e| e.value).collect();
        assert_eq!(values, vec![0.0, 5.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn interpolated_half_rounds_away_from_zero() {
        let t = CalibrationTable::from_dense(&[0.0, 1.0]).unwrap();
        let out = rescale(&t, 1, 2).unwrap();
        assert_eq!(out.get(1.0), Some(1.0));
    }

    #[test]
    fn missing_intermediate_key_is_a_domain_gap() {
        let t = CalibrationTable::new(vec![
            TableEntry { key: 0.0, value: 0.0 },
            TableEntry { key: 1.0, value: 5.0 },
            TableEntry { key: 3.0, value: 9.0 },
        ])
        .unwrap();
        let err = rescale(&t, 3, 6).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::DomainGap {
                stage: "rescale",
                key: 2,
                max: 3
            }
        );
    }

    #[test]
    fn table_shorter_than_old_max_is_a_domain_gap() {
        let t = linear_table(10, 1.0);
        let err = rescale(&t, 20, 10).unwrap_err();
        assert!(matches!(err, CalibrationError::DomainGap { key: 11, .. }));
    }

    #[test]
    fn keys_above_old_max_are_ignored() {
        let t = linear_table(12, 2.0);
        let out = rescale(&t, 10, 5).unwrap();
        assert_eq!(out.get(5.0), Some(20.0));
    }

    #[test]
    fn zero_new_max_keeps_first_entry() {
        let t = linear_table(8, 2.0);
        let out = rescale(&t, 8, 0).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.get(0.0), Some(0.0));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn same_max_is_identity(values in prop::collection::vec(-5_000i32..5_000, 1..200)) {
            let values: Vec<f64> = values.into_iter().map(f64::from).collect();
            let t = CalibrationTable::from_dense(&values).unwrap();
            let max = (values.len() - 1) as u32;
            let out = rescale(&t, max, max).unwrap();
            prop_assert_eq!(out, t);
        }

        #[test]
        fn monotonic_tables_do_not_overshoot(
            steps in prop::collection::vec(0u32..50, 2..300),
            new_max in 1u32..1_000,
        ) {
            let mut acc = 0.0;
            let values: Vec<f64> = steps.iter().map(|s| { acc += f64::from(*s); acc }).collect();
            let t = CalibrationTable::from_dense(&values).unwrap();
            let old_max = (values.len() - 1) as u32;
            let (lo, hi) = t.value_range();

            let out = rescale(&t, old_max, new_max).unwrap();
            prop_assert_eq!(out.len(), new_max as usize + 1);
            for e in out.entries() {
                prop_assert!(e.value >= lo && e.value <= hi, "value {} outside [{}, {}]", e.value, lo, hi);
            }
        }
    }
}
