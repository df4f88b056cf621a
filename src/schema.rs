//! Schema
//!
//! Declarative constraint table for raw patient input. Every request and training table
//! is checked against it before any feature engineering happens.
use crate::constants::{AGE, AVG_LOS, CREATININE, GENDER, HEART_RATE, NUM_ENCOUNTERS, SYSTOLIC_BP};
use crate::data::FeatureTable;
use crate::errors::ReadmitError;
use std::fmt;

/// A single check applied to every value in a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Check {
    /// Closed interval.
    InRange(f64, f64),
    /// Greater than or equal.
    Ge(f64),
    /// One of a fixed set of codes.
    IsIn(&'static [f64]),
}

impl Check {
    pub fn holds(&self, v: f64) -> bool {
        match *self {
            Check::InRange(lo, hi) => lo <= v && v <= hi,
            Check::Ge(lo) => v >= lo,
            Check::IsIn(set) => set.contains(&v),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::InRange(lo, hi) => write!(f, "in range [{}, {}]", lo, hi),
            Check::Ge(lo) => write!(f, ">= {}", lo),
            Check::IsIn(set) => write!(f, "one of {:?}", set),
        }
    }
}

/// Expected storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    Int,
    Float,
}

/// Constraint on a single named column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnRule {
    pub name: &'static str,
    pub dtype: Dtype,
    pub check: Check,
}

/// Raw patient feature constraints.
pub const PATIENT_FEATURE_SCHEMA: [ColumnRule; 7] = [
    ColumnRule {
        name: AGE,
        dtype: Dtype::Int,
        check: Check::InRange(0.0, 120.0),
    },
    ColumnRule {
        name: GENDER,
        dtype: Dtype::Int,
        check: Check::IsIn(&[0.0, 1.0]),
    },
    ColumnRule {
        name: NUM_ENCOUNTERS,
        dtype: Dtype::Int,
        check: Check::Ge(0.0),
    },
    ColumnRule {
        name: AVG_LOS,
        dtype: Dtype::Float,
        check: Check::Ge(0.0),
    },
    ColumnRule {
        name: CREATININE,
        dtype: Dtype::Float,
        check: Check::Ge(0.0),
    },
    ColumnRule {
        name: HEART_RATE,
        dtype: Dtype::Float,
        check: Check::InRange(30.0, 250.0),
    },
    ColumnRule {
        name: SYSTOLIC_BP,
        dtype: Dtype::Float,
        check: Check::InRange(50.0, 250.0),
    },
];

/// Validate a table against a set of column rules.
///
/// Missing values are rejected, as are fractional values in integer columns. Returns the
/// first violation found, scanning rules in order.
pub fn validate_with(table: &FeatureTable, rules: &[ColumnRule]) -> Result<(), ReadmitError> {
    for rule in rules {
        let values = table.require_numeric(rule.name)?;
        for (row, &v) in values.iter().enumerate() {
            let violation = if v.is_nan() {
                Some("not null".to_string())
            } else if rule.dtype == Dtype::Int && v.fract() != 0.0 {
                Some("integer".to_string())
            } else if !rule.check.holds(v) {
                Some(rule.check.to_string())
            } else {
                None
            };
            if let Some(constraint) = violation {
                return Err(ReadmitError::ConstraintViolation {
                    column: rule.name.to_string(),
                    row,
                    value: v,
                    constraint,
                });
            }
        }
    }
    Ok(())
}

/// Validate raw patient input against [`PATIENT_FEATURE_SCHEMA`].
pub fn validate(table: &FeatureTable) -> Result<(), ReadmitError> {
    validate_with(table, &PATIENT_FEATURE_SCHEMA)
}
