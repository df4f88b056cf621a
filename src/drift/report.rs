//! Drift Report
//!
//! Per-column verdicts produced by the [`DriftDetector`](super::DriftDetector). A column is
//! either evaluated, with its statistics, or skipped with the reason it could not be compared,
//! so "no drift" and "not enough data" are never conflated.
use crate::config::JsonIO;
use crate::constants::{PSI_MAJOR, PSI_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why a reference column has no statistics in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The current table has no column with this name.
    MissingInCurrent,
    /// The current table has the column, but it is not numeric.
    NonNumericInCurrent,
    /// The reference column has no usable values.
    NoReferenceData,
    /// The current column has no usable values.
    NoCurrentData,
}

/// Whether the statistics of an evaluated column can be taken at face value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reliability {
    Reliable,
    Unreliable { note: String },
}

/// Conventional PSI severity bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsiBand {
    /// PSI up to 0.1.
    Stable,
    /// PSI above 0.1, up to 0.25.
    Moderate,
    /// PSI above 0.25.
    Major,
}

impl PsiBand {
    pub fn from_psi(psi: f64) -> Self {
        if psi > PSI_MAJOR {
            PsiBand::Major
        } else if psi > PSI_THRESHOLD {
            PsiBand::Moderate
        } else {
            PsiBand::Stable
        }
    }
}

/// Statistics for a column with usable data on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub ks_stat: f64,
    pub ks_pvalue: f64,
    pub psi: f64,
    pub drift_detected: bool,
    pub reliability: Reliability,
}

impl ColumnStats {
    pub fn psi_band(&self) -> PsiBand {
        PsiBand::from_psi(self.psi)
    }

    pub fn is_reliable(&self) -> bool {
        self.reliability == Reliability::Reliable
    }
}

/// Verdict for a single reference column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ColumnVerdict {
    Evaluated(ColumnStats),
    Skipped { reason: SkipReason },
}

impl ColumnVerdict {
    pub fn stats(&self) -> Option<&ColumnStats> {
        match self {
            ColumnVerdict::Evaluated(s) => Some(s),
            ColumnVerdict::Skipped { .. } => None,
        }
    }

    pub fn drift_detected(&self) -> bool {
        self.stats().map(|s| s.drift_detected).unwrap_or(false)
    }
}

/// Drift verdicts keyed by column name, in sorted column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub columns: BTreeMap<String, ColumnVerdict>,
}

impl DriftReport {
    pub fn get(&self, column: &str) -> Option<&ColumnVerdict> {
        self.columns.get(column)
    }

    /// Evaluated columns only.
    pub fn evaluated(&self) -> impl Iterator<Item = (&str, &ColumnStats)> {
        self.columns
            .iter()
            .filter_map(|(name, v)| v.stats().map(|s| (name.as_str(), s)))
    }

    /// Skipped columns and why.
    pub fn skipped(&self) -> impl Iterator<Item = (&str, SkipReason)> {
        self.columns.iter().filter_map(|(name, v)| match v {
            ColumnVerdict::Skipped { reason } => Some((name.as_str(), *reason)),
            ColumnVerdict::Evaluated(_) => None,
        })
    }

    /// Names of columns flagged as drifted.
    pub fn drifted_columns(&self) -> Vec<&str> {
        self.evaluated()
            .filter(|(_, s)| s.drift_detected)
            .map(|(n, _)| n)
            .collect()
    }

    pub fn any_drift(&self) -> bool {
        self.columns.values().any(ColumnVerdict::drift_detected)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl JsonIO for DriftReport {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> DriftReport {
        let mut columns = BTreeMap::new();
        columns.insert(
            "age".to_string(),
            ColumnVerdict::Evaluated(ColumnStats {
                ks_stat: 0.5,
                ks_pvalue: 0.01,
                psi: 0.3,
                drift_detected: true,
                reliability: Reliability::Reliable,
            }),
        );
        columns.insert(
            "heart_rate".to_string(),
            ColumnVerdict::Skipped {
                reason: SkipReason::NoCurrentData,
            },
        );
        DriftReport { columns }
    }

    #[test]
    fn test_report_views() {
        let r = report();
        assert_eq!(r.len(), 2);
        assert_eq!(r.evaluated().count(), 1);
        assert_eq!(r.skipped().collect::<Vec<_>>(), vec![("heart_rate", SkipReason::NoCurrentData)]);
        assert_eq!(r.drifted_columns(), vec!["age"]);
        assert!(r.any_drift());
        assert_eq!(r.get("age").unwrap().stats().unwrap().psi_band(), PsiBand::Major);
    }

    #[test]
    fn test_report_json_shape() {
        let value = serde_json::to_value(report()).unwrap();
        assert_eq!(
            value,
            json!({
                "columns": {
                    "age": {
                        "status": "evaluated",
                        "ks_stat": 0.5,
                        "ks_pvalue": 0.01,
                        "psi": 0.3,
                        "drift_detected": true,
                        "reliability": {"kind": "reliable"}
                    },
                    "heart_rate": {"status": "skipped", "reason": "no_current_data"}
                }
            })
        );
        let back = DriftReport::from_json(&report().json_dump().unwrap()).unwrap();
        assert_eq!(back, report());
    }

    #[test]
    fn test_psi_band() {
        assert_eq!(PsiBand::from_psi(0.05), PsiBand::Stable);
        assert_eq!(PsiBand::from_psi(0.1), PsiBand::Stable);
        assert_eq!(PsiBand::from_psi(0.2), PsiBand::Moderate);
        assert_eq!(PsiBand::from_psi(0.26), PsiBand::Major);
    }
}
