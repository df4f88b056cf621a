//! Data
//!
//! Columnar feature table used by the feature engineering and drift detection steps.
//! Numeric columns store missing values as `NaN`, text columns as `None`.
use crate::constants::{AGE, AVG_LOS, CREATININE, GENDER, HEART_RATE, NUM_ENCOUNTERS, RAW_FEATURES, SYSTOLIC_BP};
use crate::errors::ReadmitError;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Numeric values of a single row, keyed by column name.
///
/// A `BTreeMap` keeps the keys sorted, so serializing a row is canonical.
pub type FeatureRow = BTreeMap<String, f64>;

/// Raw clinical fields of one patient, as received by the scoring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientFeatures {
    pub age: i64,
    /// 1 = male, 0 = female.
    pub gender: i64,
    pub num_encounters: i64,
    pub avg_los: f64,
    pub creatinine: f64,
    pub heart_rate: f64,
    pub systolic_bp: f64,
}

impl PatientFeatures {
    /// Raw fields keyed by column name.
    pub fn to_row(&self) -> FeatureRow {
        [
            (AGE, self.age as f64),
            (GENDER, self.gender as f64),
            (NUM_ENCOUNTERS, self.num_encounters as f64),
            (AVG_LOS, self.avg_los),
            (CREATININE, self.creatinine),
            (HEART_RATE, self.heart_rate),
            (SYSTOLIC_BP, self.systolic_bp),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    /// Single-row table with the raw columns in their canonical order.
    pub fn to_table(&self) -> FeatureTable {
        let row = self.to_row();
        let names: Vec<String> = RAW_FEATURES.iter().map(|n| n.to_string()).collect();
        let columns = RAW_FEATURES.iter().map(|&n| Column::Numeric(vec![row[n]])).collect();
        let index = names.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect();
        FeatureTable {
            names,
            columns,
            index,
            rows: 1,
        }
    }
}

/// A single named column of a [`FeatureTable`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Column {
    /// Numeric values, `NaN` marks a missing value.
    Numeric(Vec<f64>),
    /// Free text such as identifiers, `None` marks a missing value.
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    /// Borrow the values of a numeric column.
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Column::Numeric(v) => Some(v),
            Column::Text(_) => None,
        }
    }

    /// Number of missing entries.
    pub fn missing_count(&self) -> usize {
        match self {
            Column::Numeric(v) => v.iter().filter(|x| x.is_nan()).count(),
            Column::Text(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }
}

/// Ordered collection of named, equally long columns.
///
/// Transformations in this crate never mutate a table they borrow, they return a new one.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    names: Vec<String>,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    rows: usize,
}

impl FeatureTable {
    /// Create an empty table.
    pub fn new() -> Self {
        FeatureTable::default()
    }

    /// Build a table from `(name, column)` pairs, preserving their order.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Column)>) -> Result<Self, ReadmitError> {
        let mut table = FeatureTable::new();
        for (name, column) in columns {
            table.push_column(name, column)?;
        }
        Ok(table)
    }

    /// Build a table from numeric rows.
    ///
    /// The column set is the union of all row keys, in sorted order. A key missing
    /// from a row becomes a missing value.
    pub fn from_rows(rows: &[FeatureRow]) -> Self {
        let mut names: Vec<&String> = rows.iter().flat_map(|r| r.keys()).collect();
        names.sort();
        names.dedup();
        let mut table = FeatureTable::new();
        table.rows = rows.len();
        for name in names {
            let values = rows.iter().map(|r| r.get(name).copied().unwrap_or(f64::NAN)).collect();
            table.index.insert(name.clone(), table.columns.len());
            table.names.push(name.clone());
            table.columns.push(Column::Numeric(values));
        }
        table
    }

    /// Append a new column at the end of the table.
    pub fn push_column<S: Into<String>>(&mut self, name: S, column: Column) -> Result<(), ReadmitError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(ReadmitError::DuplicateColumn(name));
        }
        if self.columns.is_empty() {
            self.rows = column.len();
        } else if column.len() != self.rows {
            return Err(ReadmitError::LengthMismatch {
                column: name,
                expected: self.rows,
                found: column.len(),
            });
        }
        self.index.insert(name.clone(), self.columns.len());
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Replace a column in place, or append it if the name is new.
    pub fn set_column<S: Into<String>>(&mut self, name: S, column: Column) -> Result<(), ReadmitError> {
        let name = name.into();
        let existing = self.index.get(&name).copied();
        match existing {
            Some(i) => {
                if self.columns.len() > 1 && column.len() != self.rows {
                    return Err(ReadmitError::LengthMismatch {
                        column: name,
                        expected: self.rows,
                        found: column.len(),
                    });
                }
                self.rows = column.len();
                self.columns[i] = column;
                Ok(())
            }
            None => self.push_column(name, column),
        }
    }

    /// Map every value of a numeric column in place.
    ///
    /// Returns `false`, leaving the table untouched, when there is no numeric column `name`.
    pub fn update_numeric<F: Fn(f64) -> f64>(&mut self, name: &str, f: F) -> bool {
        let i = match self.index.get(name) {
            Some(&i) => i,
            None => return false,
        };
        match &mut self.columns[i] {
            Column::Numeric(v) => {
                v.iter_mut().for_each(|x| *x = f(*x));
                true
            }
            Column::Text(_) => false,
        }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.columns.len()
    }

    /// Column names in table order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    /// Get the values of a numeric column by name.
    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        self.column(name).and_then(Column::as_numeric)
    }

    /// Like [`FeatureTable::numeric`], but a missing or text column is an error.
    pub fn require_numeric(&self, name: &str) -> Result<&[f64], ReadmitError> {
        self.numeric(name)
            .ok_or_else(|| ReadmitError::MissingColumn(name.to_string()))
    }

    /// Names of all numeric columns, in table order.
    pub fn numeric_names(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, c)| c.is_numeric())
            .map(|(n, _)| n)
            .collect()
    }

    /// Iterate over `(name, column)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Numeric values of row `i`. Text columns are left out.
    pub fn row(&self, i: usize) -> FeatureRow {
        self.iter()
            .filter_map(|(n, c)| c.as_numeric().map(|v| (n.to_string(), v[i])))
            .collect()
    }

    /// Keep only the last `n` rows.
    pub fn tail(&self, n: usize) -> FeatureTable {
        let start = self.rows.saturating_sub(n);
        let columns = self
            .columns
            .iter()
            .map(|c| match c {
                Column::Numeric(v) => Column::Numeric(v[start..].to_vec()),
                Column::Text(v) => Column::Text(v[start..].to_vec()),
            })
            .collect();
        FeatureTable {
            names: self.names.clone(),
            columns,
            index: self.index.clone(),
            rows: self.rows - start,
        }
    }

    /// Stack the rows of `other` below the rows of this table.
    ///
    /// Both tables must have the same column names and kinds, in any order.
    pub fn concat(&self, other: &FeatureTable) -> Result<FeatureTable, ReadmitError> {
        if self.columns.is_empty() {
            return Ok(other.clone());
        }
        let mut out = FeatureTable::new();
        for (name, column) in self.iter() {
            let stacked = match (column, other.column(name)) {
                (Column::Numeric(a), Some(Column::Numeric(b))) => Column::Numeric(a.iter().chain(b).copied().collect()),
                (Column::Text(a), Some(Column::Text(b))) => Column::Text(a.iter().chain(b).cloned().collect()),
                _ => return Err(ReadmitError::MissingColumn(name.to_string())),
            };
            out.push_column(name, stacked)?;
        }
        if other.cols() != self.cols() {
            if let Some(extra) = other.names().iter().find(|n| !self.contains(n)) {
                return Err(ReadmitError::MissingColumn(extra.clone()));
            }
        }
        Ok(out)
    }

    /// Read a table from CSV with a header row.
    ///
    /// A column whose non-empty cells all parse as `f64` is numeric; anything else
    /// is text. Empty cells are missing values.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, ReadmitError> {
        let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = csv_reader
            .headers()
            .map_err(|e| ReadmitError::UnableToRead(e.to_string()))?
            .clone();

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for result in csv_reader.records() {
            let record = result.map_err(|e| ReadmitError::UnableToRead(e.to_string()))?;
            for (i, cell) in record.iter().enumerate().take(headers.len()) {
                cells[i].push(cell.trim().to_string());
            }
        }

        let mut table = FeatureTable::new();
        for (name, raw) in headers.iter().zip(cells) {
            let parsed: Option<Vec<f64>> = raw
                .iter()
                .map(|s| if s.is_empty() { Some(f64::NAN) } else { s.parse::<f64>().ok() })
                .collect();
            let column = match parsed {
                Some(values) => Column::Numeric(values),
                None => Column::Text(
                    raw.into_iter()
                        .map(|s| if s.is_empty() { None } else { Some(s) })
                        .collect(),
                ),
            };
            table.push_column(name, column)?;
        }
        Ok(table)
    }

    /// Read a table from a CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, ReadmitError> {
        let file = File::open(path.as_ref())
            .map_err(|e| ReadmitError::UnableToRead(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_csv_reader(file)
    }

    /// Write the table as CSV with a header row. Missing values are written as empty cells.
    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<(), ReadmitError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer
            .write_record(&self.names)
            .map_err(|e| ReadmitError::UnableToWrite(e.to_string()))?;
        for i in 0..self.rows {
            let record: Vec<String> = self
                .columns
                .iter()
                .map(|c| match c {
                    Column::Numeric(v) if v[i].is_nan() => String::new(),
                    Column::Numeric(v) => v[i].to_string(),
                    Column::Text(v) => v[i].clone().unwrap_or_default(),
                })
                .collect();
            csv_writer
                .write_record(&record)
                .map_err(|e| ReadmitError::UnableToWrite(e.to_string()))?;
        }
        csv_writer.flush().map_err(|e| ReadmitError::UnableToWrite(e.to_string()))
    }

    /// Write the table to a CSV file.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), ReadmitError> {
        let file = File::create(path.as_ref())
            .map_err(|e| ReadmitError::UnableToWrite(format!("{}: {}", path.as_ref().display(), e)))?;
        self.to_csv_writer(file)
    }
}
