use crate::config::DriftConfig;
use crate::constants::PSI_SENTINEL;
use crate::data::{Column, FeatureTable};
use crate::drift::report::{ColumnStats, ColumnVerdict, DriftReport, Reliability, SkipReason};
use crate::drift::stats::{ks_2samp, psi};
use crate::errors::ReadmitError;
use log::{info, warn};
use rayon::prelude::*;

/// Drift decision rule. Either signal alone is enough.
///
/// * `ks_pvalue` - KS test p-value.
/// * `psi` - Population Stability Index.
/// * `ks_alpha` - Significance level for the KS test.
/// * `psi_threshold` - PSI above which the population counts as shifted.
#[inline]
pub fn drift_decision(ks_pvalue: f64, psi: f64, ks_alpha: f64, psi_threshold: f64) -> bool {
    ks_pvalue < ks_alpha || psi > psi_threshold
}

fn usable(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Compares a current feature table against a reference table, column by column.
///
/// Holds only configuration, so one detector can serve any number of concurrent checks
/// against the same reference.
#[derive(Debug, Clone, Default)]
pub struct DriftDetector {
    pub cfg: DriftConfig,
}

impl DriftDetector {
    /// Create a detector after validating its configuration.
    pub fn new(cfg: DriftConfig) -> Result<Self, ReadmitError> {
        cfg.validate()?;
        Ok(DriftDetector { cfg })
    }

    /// Compare two samples of one column. Missing and infinite values must already be removed,
    /// and both samples must be non-empty.
    pub fn compare(&self, reference: &[f64], current: &[f64]) -> ColumnStats {
        let ks = ks_2samp(reference, current, self.cfg.exact_ks_limit);
        let p = psi(reference, current, self.cfg.buckets, self.cfg.smoothing);

        let mut notes = Vec::new();
        if p.degenerate {
            notes.push("constant reference values, PSI buckets widened by 0.5 on each side".to_string());
        }

        let finite = ks.statistic.is_finite() && ks.pvalue.is_finite() && p.psi.is_finite();
        let (ks_stat, ks_pvalue, psi_value, drift_detected) = if finite {
            (
                ks.statistic,
                ks.pvalue,
                p.psi,
                drift_decision(ks.pvalue, p.psi, self.cfg.ks_alpha, self.cfg.psi_threshold),
            )
        } else {
            notes.push("non-finite statistic replaced by sentinel".to_string());
            (1.0, 0.0, PSI_SENTINEL, true)
        };

        let reliability = if notes.is_empty() {
            Reliability::Reliable
        } else {
            Reliability::Unreliable { note: notes.join("; ") }
        };
        ColumnStats {
            ks_stat,
            ks_pvalue,
            psi: psi_value,
            drift_detected,
            reliability,
        }
    }

    fn column_verdict(&self, name: &str, reference: &[f64], current: Option<&Column>) -> ColumnVerdict {
        let current = match current {
            None => {
                return ColumnVerdict::Skipped {
                    reason: SkipReason::MissingInCurrent,
                }
            }
            Some(Column::Text(_)) => {
                return ColumnVerdict::Skipped {
                    reason: SkipReason::NonNumericInCurrent,
                }
            }
            Some(Column::Numeric(v)) => v,
        };
        let (r, c) = (usable(reference), usable(current));
        if r.is_empty() {
            return ColumnVerdict::Skipped {
                reason: SkipReason::NoReferenceData,
            };
        }
        if c.is_empty() {
            return ColumnVerdict::Skipped {
                reason: SkipReason::NoCurrentData,
            };
        }
        let stats = self.compare(&r, &c);
        if let Reliability::Unreliable { note } = &stats.reliability {
            warn!("Column {} drift statistics are unreliable: {}.", name, note);
        }
        ColumnVerdict::Evaluated(stats)
    }

    /// Build a drift report for every numeric column of `reference`.
    ///
    /// Columns without usable data on both sides are reported as skipped. Fails only if the
    /// two tables share no numeric column at all.
    ///
    /// * `reference` - Frozen reference table, prepared without normalization.
    /// * `current` - Live table, prepared the same way.
    pub fn detect(&self, reference: &FeatureTable, current: &FeatureTable) -> Result<DriftReport, ReadmitError> {
        let names = reference.numeric_names();
        let shared = names
            .iter()
            .filter(|n| current.numeric(n).is_some())
            .count();
        if shared == 0 {
            return Err(ReadmitError::NoSharedColumns);
        }

        let verdict = |name: &&str| {
            // Every name here came from `numeric_names`, so the lookup cannot miss.
            let values = reference.numeric(name).unwrap_or(&[]);
            (name.to_string(), self.column_verdict(name, values, current.column(name)))
        };
        let verdicts: Vec<(String, ColumnVerdict)> = if self.cfg.parallel {
            names.par_iter().map(verdict).collect()
        } else {
            names.iter().map(verdict).collect()
        };

        let report = DriftReport {
            columns: verdicts.into_iter().collect(),
        };
        info!(
            "Drift check over {} reference rows and {} current rows: {} evaluated, {} skipped, {} drifted.",
            reference.rows(),
            current.rows(),
            report.evaluated().count(),
            report.skipped().count(),
            report.drifted_columns().len()
        );
        Ok(report)
    }
}

/// Compare two prepared tables with the default configuration.
pub fn detect_drift(reference: &FeatureTable, current: &FeatureTable) -> Result<DriftReport, ReadmitError> {
    DriftDetector::default().detect(reference, current)
}
