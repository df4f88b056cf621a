//! Feature Engineering
//!
//! Turns raw clinical fields into the modeling feature set. The same steps must run on the
//! reference snapshot and on every live batch, otherwise drift comparisons are meaningless.
//!
//! Order is fixed: impute, derive, encode, then optionally normalize. Normalization is for
//! model training only and must never be applied to drift inputs, since it rescales each table
//! to its own mean and variance.
use crate::config::JsonIO;
use crate::constants::{
    AVG_LOS, CREATININE, ENCOUNTER_LOS_RATIO, HEART_RATE, HIGH_BP, HIGH_CREATININE, HIGH_CREATININE_MG_DL,
    HIGH_SYSTOLIC_BP, LOS_EPS, NORMALIZE_EPS, NUM_ENCOUNTERS, PATIENT_ID, READMITTED_30D, SYSTOLIC_BP, TACHYCARDIA,
    TACHYCARDIA_BPM,
};
use crate::data::{Column, FeatureTable};
use crate::errors::ReadmitError;
use crate::utils::{mean, median, sample_std};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn fill_missing(fill: f64) -> impl Fn(f64) -> f64 {
    move |v| if v.is_nan() { fill } else { v }
}

fn indicator(values: &[f64], pred: impl Fn(f64) -> bool) -> Column {
    Column::Numeric(values.iter().map(|&v| if pred(v) { 1.0 } else { 0.0 }).collect())
}

/// Replace missing numeric values with the median of the same column in the same table.
///
/// Text columns pass through unchanged. A column with no observed values is left as is.
pub fn handle_missing_values(table: &FeatureTable) -> FeatureTable {
    let mut out = table.clone();
    for (name, column) in table.iter() {
        if let Column::Numeric(values) = column {
            match median(values) {
                Some(m) => {
                    out.update_numeric(name, fill_missing(m));
                }
                None => warn!("Column {} has no observed values, skipping imputation.", name),
            }
        }
    }
    out
}

/// Imputation values captured from a reference table.
///
/// Applying frozen medians to live batches keeps small batches from manufacturing drift
/// through their own, noisy, medians. Persist alongside the model artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImputationParams {
    pub medians: BTreeMap<String, f64>,
}

impl ImputationParams {
    /// Capture the median of every numeric column with at least one observed value.
    pub fn fit(table: &FeatureTable) -> Self {
        let medians = table
            .iter()
            .filter_map(|(name, column)| {
                column
                    .as_numeric()
                    .and_then(median)
                    .map(|m| (name.to_string(), m))
            })
            .collect();
        ImputationParams { medians }
    }

    /// Fill missing values using the frozen medians.
    ///
    /// Columns without a stored median fall back to the table's own median.
    pub fn apply(&self, table: &FeatureTable) -> FeatureTable {
        let mut out = table.clone();
        for (name, column) in table.iter() {
            let values = match column.as_numeric() {
                Some(v) => v,
                None => continue,
            };
            let fill = match self.medians.get(name) {
                Some(&m) => Some(m),
                None => {
                    debug!("No frozen median for column {}, using the batch median.", name);
                    median(values)
                }
            };
            match fill {
                Some(m) => {
                    out.update_numeric(name, fill_missing(m));
                }
                None => warn!("Column {} has no observed values, skipping imputation.", name),
            }
        }
        out
    }
}

impl JsonIO for ImputationParams {}

/// Append the derived clinical indicator and ratio columns.
///
/// * `high_creatinine` - creatinine above 1.5 mg/dL.
/// * `high_bp` - systolic pressure at or above 140.
/// * `tachycardia` - heart rate at or above 100.
/// * `encounter_los_ratio` - encounters per day of average length of stay.
///
/// Existing derived columns are recomputed and replaced, so running this twice is safe.
pub fn add_derived_features(table: &FeatureTable) -> Result<FeatureTable, ReadmitError> {
    let creatinine = table.require_numeric(CREATININE)?;
    let systolic_bp = table.require_numeric(SYSTOLIC_BP)?;
    let heart_rate = table.require_numeric(HEART_RATE)?;
    let num_encounters = table.require_numeric(NUM_ENCOUNTERS)?;
    let avg_los = table.require_numeric(AVG_LOS)?;

    let ratio = num_encounters
        .iter()
        .zip(avg_los)
        .map(|(n, los)| n / (los + LOS_EPS))
        .collect();

    let mut out = table.clone();
    out.set_column(HIGH_CREATININE, indicator(creatinine, |v| v > HIGH_CREATININE_MG_DL))?;
    out.set_column(HIGH_BP, indicator(systolic_bp, |v| v >= HIGH_SYSTOLIC_BP))?;
    out.set_column(TACHYCARDIA, indicator(heart_rate, |v| v >= TACHYCARDIA_BPM))?;
    out.set_column(ENCOUNTER_LOS_RATIO, Column::Numeric(ratio))?;
    Ok(out)
}

/// Encode categorical fields. Gender arrives pre-encoded, so this keeps every column as is.
pub fn encode_categoricals(table: &FeatureTable) -> FeatureTable {
    table.clone()
}

/// Z-score every numeric column not listed in `exclude`.
///
/// Uses the sample standard deviation plus a small epsilon. A column with a single observed
/// value has no spread and maps to zero.
pub fn normalize_features(table: &FeatureTable, exclude: &[&str]) -> FeatureTable {
    let mut out = table.clone();
    for (name, column) in table.iter() {
        if exclude.contains(&name) {
            continue;
        }
        let values = match column.as_numeric() {
            Some(v) => v,
            None => continue,
        };
        let m = match mean(values) {
            Some(m) => m,
            None => continue,
        };
        let s = sample_std(values).unwrap_or(0.0) + NORMALIZE_EPS;
        out.update_numeric(name, |v| (v - m) / s);
    }
    out
}

fn finish(imputed: FeatureTable, normalize: bool) -> Result<FeatureTable, ReadmitError> {
    let derived = add_derived_features(&imputed)?;
    let encoded = encode_categoricals(&derived);
    if normalize {
        Ok(normalize_features(&encoded, &[READMITTED_30D, PATIENT_ID]))
    } else {
        Ok(encoded)
    }
}

/// Prepare a raw table for training, scoring or drift detection.
///
/// Imputes with the table's own medians. Call with `normalize = false` for anything that
/// feeds the drift detector.
pub fn prepare_features(table: &FeatureTable, normalize: bool) -> Result<FeatureTable, ReadmitError> {
    finish(handle_missing_values(table), normalize)
}

/// Same as [`prepare_features`], but imputes with frozen reference medians.
pub fn prepare_features_with(
    table: &FeatureTable,
    params: &ImputationParams,
    normalize: bool,
) -> Result<FeatureTable, ReadmitError> {
    finish(params.apply(table), normalize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AGE, DERIVED_FEATURES, GENDER};

    fn raw_table() -> FeatureTable {
        FeatureTable::from_columns(vec![
            (
                PATIENT_ID,
                Column::Text(vec![Some("a".to_string()), Some("b".to_string()), Some("c".to_string())]),
            ),
            (AGE, Column::Numeric(vec![70.0, 45.0, 60.0])),
            (GENDER, Column::Numeric(vec![1.0, 0.0, 1.0])),
            (NUM_ENCOUNTERS, Column::Numeric(vec![4.0, 1.0, 2.0])),
            (AVG_LOS, Column::Numeric(vec![2.0, 5.0, f64::NAN])),
            (CREATININE, Column::Numeric(vec![2.0, 0.9, f64::NAN])),
            (HEART_RATE, Column::Numeric(vec![105.0, 72.0, 99.0])),
            (SYSTOLIC_BP, Column::Numeric(vec![150.0, 120.0, 140.0])),
        ])
        .unwrap()
    }

    fn assert_tables_eq(a: &FeatureTable, b: &FeatureTable) {
        assert_eq!(a.names(), b.names());
        for name in a.numeric_names() {
            let (x, y) = (a.numeric(name).unwrap(), b.numeric(name).unwrap());
            assert_eq!(x.len(), y.len());
            for (u, v) in x.iter().zip(y) {
                assert!(u.to_bits() == v.to_bits(), "{} differs: {} vs {}", name, u, v);
            }
        }
    }

    #[test]
    fn test_derived_feature_values() {
        let table = FeatureTable::from_columns(vec![
            (CREATININE, Column::Numeric(vec![2.0])),
            (SYSTOLIC_BP, Column::Numeric(vec![150.0])),
            (HEART_RATE, Column::Numeric(vec![105.0])),
            (NUM_ENCOUNTERS, Column::Numeric(vec![4.0])),
            (AVG_LOS, Column::Numeric(vec![2.0])),
        ])
        .unwrap();
        let out = add_derived_features(&table).unwrap();
        assert_eq!(out.numeric(HIGH_CREATININE).unwrap(), &[1.0]);
        assert_eq!(out.numeric(HIGH_BP).unwrap(), &[1.0]);
        assert_eq!(out.numeric(TACHYCARDIA).unwrap(), &[1.0]);
        assert!((out.numeric(ENCOUNTER_LOS_RATIO).unwrap()[0] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_derived_thresholds_are_inclusive_where_expected() {
        let table = FeatureTable::from_columns(vec![
            (CREATININE, Column::Numeric(vec![1.5])),
            (SYSTOLIC_BP, Column::Numeric(vec![140.0])),
            (HEART_RATE, Column::Numeric(vec![100.0])),
            (NUM_ENCOUNTERS, Column::Numeric(vec![0.0])),
            (AVG_LOS, Column::Numeric(vec![0.0])),
        ])
        .unwrap();
        let out = add_derived_features(&table).unwrap();
        assert_eq!(out.numeric(HIGH_CREATININE).unwrap(), &[0.0]);
        assert_eq!(out.numeric(HIGH_BP).unwrap(), &[1.0]);
        assert_eq!(out.numeric(TACHYCARDIA).unwrap(), &[1.0]);
        assert_eq!(out.numeric(ENCOUNTER_LOS_RATIO).unwrap(), &[0.0]);
    }

    #[test]
    fn test_derived_requires_raw_columns() {
        let raw = raw_table();
        let table = FeatureTable::from_columns(
            raw.iter()
                .filter(|(n, _)| *n != HEART_RATE)
                .map(|(n, c)| (n.to_string(), c.clone()))
                .collect(),
        )
        .unwrap();
        assert!(matches!(add_derived_features(&table), Err(ReadmitError::MissingColumn(c)) if c == HEART_RATE));
    }

    #[test]
    fn test_handle_missing_values_uses_own_median() {
        let out = handle_missing_values(&raw_table());
        assert_eq!(out.numeric(AVG_LOS).unwrap(), &[2.0, 5.0, 3.5]);
        assert_eq!(out.numeric(CREATININE).unwrap(), &[2.0, 0.9, 1.45]);
        assert_eq!(out.column(PATIENT_ID).unwrap().missing_count(), 0);
    }

    #[test]
    fn test_handle_missing_values_all_missing_is_noop() {
        let table = FeatureTable::from_columns(vec![("x", Column::Numeric(vec![f64::NAN, f64::NAN]))]).unwrap();
        let out = handle_missing_values(&table);
        assert!(out.numeric("x").unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_input_table_not_mutated() {
        let table = raw_table();
        let _ = prepare_features(&table, true).unwrap();
        assert!(table.numeric(AVG_LOS).unwrap()[2].is_nan());
        assert!(!table.contains(HIGH_BP));
    }

    #[test]
    fn test_prepare_features_idempotent() {
        let once = prepare_features(&raw_table(), false).unwrap();
        let twice = prepare_features(&once, false).unwrap();
        assert_eq!(once.cols(), raw_table().cols() + DERIVED_FEATURES.len());
        assert!(DERIVED_FEATURES.iter().all(|name| once.contains(name)));
        assert_tables_eq(&once, &twice);
    }

    #[test]
    fn test_derivation_deterministic() {
        let a = add_derived_features(&raw_table()).unwrap();
        let b = add_derived_features(&raw_table()).unwrap();
        assert_tables_eq(&a, &b);
    }

    #[test]
    fn test_frozen_imputation() {
        let reference = FeatureTable::from_columns(vec![("x", Column::Numeric(vec![1.0, 2.0, 3.0]))]).unwrap();
        let params = ImputationParams::fit(&reference);
        assert_eq!(params.medians["x"], 2.0);

        let live = FeatureTable::from_columns(vec![
            ("x", Column::Numeric(vec![100.0, f64::NAN])),
            ("y", Column::Numeric(vec![f64::NAN, 7.0])),
        ])
        .unwrap();
        let out = params.apply(&live);
        assert_eq!(out.numeric("x").unwrap(), &[100.0, 2.0]);
        // no frozen median, falls back to the batch
        assert_eq!(out.numeric("y").unwrap(), &[7.0, 7.0]);
    }

    #[test]
    fn test_prepare_features_with_frozen_params() {
        let params = ImputationParams::fit(&raw_table());
        let out = prepare_features_with(&raw_table(), &params, false).unwrap();
        assert_eq!(out.numeric(AVG_LOS).unwrap()[2], 3.5);
        assert_eq!(out.numeric(HIGH_CREATININE).unwrap(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_encode_categoricals_preserves_columns() {
        let table = raw_table();
        let out = encode_categoricals(&table);
        assert_eq!(out.names(), table.names());
    }

    #[test]
    fn test_normalize_features_excludes() {
        let table = FeatureTable::from_columns(vec![
            ("x", Column::Numeric(vec![1.0, 2.0, 3.0])),
            (READMITTED_30D, Column::Numeric(vec![0.0, 1.0, 0.0])),
        ])
        .unwrap();
        let out = normalize_features(&table, &[READMITTED_30D]);
        let x = out.numeric("x").unwrap();
        assert!((x[0] + 1.0).abs() < 1e-5);
        assert!(x[1].abs() < 1e-12);
        assert!((x[2] - 1.0).abs() < 1e-5);
        assert_eq!(out.numeric(READMITTED_30D).unwrap(), &[0.0, 1.0, 0.0]);
    }
}
