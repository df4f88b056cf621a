//! Errors
//!
//! Custom error types used throughout the `readmit` crate.
use thiserror::Error;

/// Errors that can occur while preparing features, validating input or detecting drift.
#[derive(Debug, Error)]
pub enum ReadmitError {
    /// A required column is absent from the table, or is not numeric.
    #[error("Required column {0} is missing from the table or is not numeric.")]
    MissingColumn(String),
    /// The reference and current tables have no numeric column in common.
    #[error("The reference and current tables share no numeric columns, nothing to compare.")]
    NoSharedColumns,
    /// A column does not have the same length as the rest of the table.
    #[error("Column {column} has {found} rows, expected {expected}.")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    /// Two columns share the same name.
    #[error("Column {0} appears more than once.")]
    DuplicateColumn(String),
    /// A raw input value broke a schema constraint.
    #[error("Value {value} in column {column} at row {row} violates constraint: {constraint}.")]
    ConstraintViolation {
        column: String,
        row: usize,
        value: f64,
        constraint: String,
    },
    /// The scorer returned something that is not a probability.
    #[error("Scorer returned {0}, expected a finite probability in [0, 1].")]
    InvalidProbability(f64),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Unable to read a table, report or configuration.
    #[error("Unable to read from {0}")]
    UnableToRead(String),
    /// Unable to write a table, report or configuration.
    #[error("Unable to write: {0}")]
    UnableToWrite(String),
    /// A FHIR bundle is missing a resource or field needed to build a feature row.
    #[error("Invalid FHIR bundle: {0}")]
    InvalidBundle(String),
}
