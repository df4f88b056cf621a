//! Service
//!
//! The scoring path of the readmission-risk service: validate, prepare, check drift against the
//! frozen reference snapshot, score with an external model, then record lineage and health.
//! The model and the snapshot are passed in explicitly, nothing lives in process-wide state.
use crate::config::{JsonIO, PredictorConfig};
use crate::data::{FeatureRow, FeatureTable, PatientFeatures};
use crate::drift::{DriftDetector, DriftReport};
use crate::errors::ReadmitError;
use crate::features::{prepare_features_with, ImputationParams};
use crate::monitor::{HealthMonitor, LineageLog, LineageRecord, LiveMetrics};
use crate::schema;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

const SNAPSHOT_TABLE: &str = "training_snapshot.csv";
const SNAPSHOT_META: &str = "snapshot.json";

/// External model adapter. Takes one engineered feature row, returns the readmission probability.
pub trait RiskScorer {
    fn predict_proba(&self, row: &FeatureRow) -> Result<f64, ReadmitError>;
    /// Version string recorded in lineage.
    fn version(&self) -> &str;
}

/// Wraps a plain function or closure as a [`RiskScorer`].
pub struct FnScorer<F> {
    f: F,
    version: String,
}

impl<F> FnScorer<F>
where
    F: Fn(&FeatureRow) -> f64,
{
    pub fn new(version: &str, f: F) -> Self {
        FnScorer {
            f,
            version: version.to_string(),
        }
    }
}

impl<F> RiskScorer for FnScorer<F>
where
    F: Fn(&FeatureRow) -> f64,
{
    fn predict_proba(&self, row: &FeatureRow) -> Result<f64, ReadmitError> {
        Ok((self.f)(row))
    }

    fn version(&self) -> &str {
        &self.version
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotMeta {
    model_version: String,
    imputation: ImputationParams,
}

impl JsonIO for SnapshotMeta {}

/// Feature table and imputation values frozen when a model version was trained.
///
/// Immutable once built. Share it between predictors with an `Arc`, replace it only when the
/// model is retrained.
#[derive(Debug, Clone)]
pub struct ReferenceSnapshot {
    pub table: FeatureTable,
    pub imputation: ImputationParams,
    pub model_version: String,
}

impl ReferenceSnapshot {
    /// Freeze a raw training table: capture its medians, then prepare it with them.
    pub fn from_raw(raw: &FeatureTable, model_version: &str) -> Result<Self, ReadmitError> {
        let imputation = ImputationParams::fit(raw);
        let table = prepare_features_with(raw, &imputation, false)?;
        Ok(ReferenceSnapshot {
            table,
            imputation,
            model_version: model_version.to_string(),
        })
    }

    /// Write the snapshot table and its metadata into `dir`.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<(), ReadmitError> {
        let dir = dir.as_ref();
        self.table.to_csv(dir.join(SNAPSHOT_TABLE))?;
        SnapshotMeta {
            model_version: self.model_version.clone(),
            imputation: self.imputation.clone(),
        }
        .save(dir.join(SNAPSHOT_META))?;
        info!("Training snapshot saved to {}.", dir.display());
        Ok(())
    }

    /// Load a snapshot written by [`ReferenceSnapshot::save`].
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, ReadmitError> {
        let dir = dir.as_ref();
        let table = FeatureTable::from_csv(dir.join(SNAPSHOT_TABLE))?;
        let meta = SnapshotMeta::load(dir.join(SNAPSHOT_META))?;
        Ok(ReferenceSnapshot {
            table,
            imputation: meta.imputation,
            model_version: meta.model_version,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Low,
}

/// Response for a single scored patient.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub probability: f64,
    pub risk_level: RiskLevel,
    /// Present when drift checks are enabled.
    pub drift: Option<DriftReport>,
    pub lineage: LineageRecord,
    pub health: Option<LiveMetrics>,
}

/// Request path of the scoring service.
pub struct Predictor<S: RiskScorer> {
    cfg: PredictorConfig,
    reference: Arc<ReferenceSnapshot>,
    scorer: S,
    detector: DriftDetector,
    window: FeatureTable,
    health: HealthMonitor,
    lineage: Option<LineageLog<Box<dyn Write + Send>>>,
}

impl<S: RiskScorer> Predictor<S> {
    pub fn new(cfg: PredictorConfig, reference: Arc<ReferenceSnapshot>, scorer: S) -> Result<Self, ReadmitError> {
        cfg.validate()?;
        if scorer.version() != reference.model_version {
            warn!(
                "Scorer version {} differs from reference snapshot version {}.",
                scorer.version(),
                reference.model_version
            );
        }
        let detector = DriftDetector::new(cfg.drift.clone())?;
        let health = HealthMonitor::new(cfg.health_window);
        Ok(Predictor {
            cfg,
            reference,
            scorer,
            detector,
            window: FeatureTable::new(),
            health,
            lineage: None,
        })
    }

    /// Append lineage records to `sink` as JSON lines.
    pub fn with_lineage_sink(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.lineage = Some(LineageLog::new(sink));
        self
    }

    pub fn reference(&self) -> &ReferenceSnapshot {
        &self.reference
    }

    fn score_row(&self, row: &FeatureRow) -> Result<f64, ReadmitError> {
        let prob = self.scorer.predict_proba(row)?;
        if !prob.is_finite() || !(0.0..=1.0).contains(&prob) {
            return Err(ReadmitError::InvalidProbability(prob));
        }
        Ok(prob)
    }

    fn risk_level(&self, prob: f64) -> RiskLevel {
        if prob > self.cfg.risk_threshold {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }

    /// Compare the last `drift_window` prepared rows, this request included, with the reference.
    fn check_drift(&self, window: &FeatureTable) -> Result<DriftReport, ReadmitError> {
        let report = self.detector.detect(&self.reference.table, window)?;
        if report.any_drift() {
            warn!("Drift detected in columns: {}", report.drifted_columns().join(", "));
        }
        Ok(report)
    }

    /// Score one patient.
    ///
    /// The request joins the drift window only once it has been scored and logged, so a failed
    /// request leaves the window as it was.
    pub fn predict(&mut self, features: &PatientFeatures) -> Result<Prediction, ReadmitError> {
        let raw = features.to_table();
        schema::validate(&raw)?;
        let prepared = prepare_features_with(&raw, &self.reference.imputation, false)?;
        let window = if self.cfg.check_drift {
            Some(self.window.concat(&prepared)?.tail(self.cfg.drift_window))
        } else {
            None
        };
        let drift = window.as_ref().map(|w| self.check_drift(w)).transpose()?;

        let probability = self.score_row(&prepared.row(0))?;
        let lineage = LineageRecord::new(features.to_row(), probability, self.scorer.version())?;
        if let Some(log) = self.lineage.as_mut() {
            log.append(&lineage)?;
        }
        if let Some(w) = window {
            self.window = w;
        }
        let health = self.health.record(probability);

        Ok(Prediction {
            probability,
            risk_level: self.risk_level(probability),
            drift,
            lineage,
            health,
        })
    }

    /// Score a raw batch and compare the whole batch against the reference.
    ///
    /// Returns one probability per row, plus the batch drift report. The rolling request
    /// window is left untouched.
    pub fn predict_batch(&mut self, raw: &FeatureTable) -> Result<(Vec<f64>, DriftReport), ReadmitError> {
        schema::validate(raw)?;
        let prepared = prepare_features_with(raw, &self.reference.imputation, false)?;
        let report = self.detector.detect(&self.reference.table, &prepared)?;
        let probs = (0..prepared.rows())
            .map(|i| self.score_row(&prepared.row(i)))
            .collect::<Result<Vec<f64>, ReadmitError>>()?;
        for &p in &probs {
            self.health.record(p);
        }
        Ok((probs, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{HEART_RATE, HIGH_BP, READMITTED_30D, TACHYCARDIA};
    use crate::drift::{ColumnVerdict, SkipReason};
    use crate::synthetic::{generate_patients, SyntheticConfig};
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn snapshot() -> Arc<ReferenceSnapshot> {
        let raw = generate_patients(&SyntheticConfig {
            n: 200,
            ..Default::default()
        })
        .unwrap();
        Arc::new(ReferenceSnapshot::from_raw(&raw, "v1").unwrap())
    }

    fn scorer() -> FnScorer<impl Fn(&FeatureRow) -> f64> {
        FnScorer::new("v1", |row: &FeatureRow| {
            0.2 + 0.3 * row.get(HIGH_BP).copied().unwrap_or(0.0) + 0.3 * row.get(TACHYCARDIA).copied().unwrap_or(0.0)
        })
    }

    fn patient(heart_rate: f64, systolic_bp: f64) -> PatientFeatures {
        PatientFeatures {
            age: 70,
            gender: 1,
            num_encounters: 4,
            avg_los: 2.0,
            creatinine: 2.0,
            heart_rate,
            systolic_bp,
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_predict_high_and_low_risk() {
        let mut predictor = Predictor::new(PredictorConfig::default(), snapshot(), scorer()).unwrap();
        let high = predictor.predict(&patient(105.0, 150.0)).unwrap();
        assert!((high.probability - 0.8).abs() < 1e-12);
        assert_eq!(high.risk_level, RiskLevel::High);
        let low = predictor.predict(&patient(80.0, 120.0)).unwrap();
        assert_eq!(low.risk_level, RiskLevel::Low);
        assert_eq!(low.lineage.model_version, "v1");
        assert_eq!(low.health.unwrap().count, 2);
    }

    #[test]
    fn test_predict_reports_drift_per_request() {
        let mut predictor = Predictor::new(PredictorConfig::default(), snapshot(), scorer()).unwrap();
        let report = predictor.predict(&patient(105.0, 150.0)).unwrap().drift.unwrap();
        assert!(report.get("heart_rate").and_then(ColumnVerdict::stats).is_some());
        assert_eq!(
            report.get(READMITTED_30D),
            Some(&ColumnVerdict::Skipped {
                reason: SkipReason::MissingInCurrent
            })
        );
    }

    #[test]
    fn test_drift_window_accumulates() {
        let cfg = PredictorConfig {
            drift_window: 3,
            ..Default::default()
        };
        let mut predictor = Predictor::new(cfg, snapshot(), scorer()).unwrap();
        for hr in [80.0, 90.0, 100.0, 110.0] {
            predictor.predict(&patient(hr, 130.0)).unwrap();
        }
        assert_eq!(predictor.window.rows(), 3);
        assert_eq!(predictor.window.numeric("heart_rate").unwrap(), &[90.0, 100.0, 110.0]);
    }

    #[test]
    fn test_invalid_input_rejected() {
        let mut predictor = Predictor::new(PredictorConfig::default(), snapshot(), scorer()).unwrap();
        assert!(matches!(
            predictor.predict(&patient(20.0, 120.0)),
            Err(ReadmitError::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_invalid_probability_rejected() {
        let bad = FnScorer::new("v1", |_: &FeatureRow| 1.5);
        let mut predictor = Predictor::new(PredictorConfig::default(), snapshot(), bad).unwrap();
        assert!(matches!(
            predictor.predict(&patient(80.0, 120.0)),
            Err(ReadmitError::InvalidProbability(_))
        ));
    }

    #[test]
    fn test_failed_request_leaves_window_unchanged() {
        let cfg = PredictorConfig {
            drift_window: 3,
            ..Default::default()
        };
        let picky = FnScorer::new("v1", |row: &FeatureRow| {
            if row.get(HEART_RATE).copied().unwrap_or(0.0) > 115.0 {
                f64::NAN
            } else {
                0.3
            }
        });
        let mut predictor = Predictor::new(cfg, snapshot(), picky).unwrap();
        predictor.predict(&patient(80.0, 120.0)).unwrap();
        assert!(matches!(
            predictor.predict(&patient(120.0, 120.0)),
            Err(ReadmitError::InvalidProbability(_))
        ));
        assert_eq!(predictor.window.rows(), 1);
        assert_eq!(predictor.window.numeric(HEART_RATE).unwrap(), &[80.0]);

        predictor.predict(&patient(90.0, 120.0)).unwrap();
        assert_eq!(predictor.window.numeric(HEART_RATE).unwrap(), &[80.0, 90.0]);
    }

    #[test]
    fn test_lineage_sink() {
        let buf = SharedBuf::default();
        let mut predictor = Predictor::new(PredictorConfig::default(), snapshot(), scorer())
            .unwrap()
            .with_lineage_sink(Box::new(buf.clone()));
        predictor.predict(&patient(80.0, 120.0)).unwrap();
        predictor.predict(&patient(81.0, 120.0)).unwrap();
        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_predict_batch_detects_shift() {
        let mut predictor = Predictor::new(PredictorConfig::default(), snapshot(), scorer()).unwrap();
        let live = generate_patients(&SyntheticConfig {
            n: 150,
            seed: 11,
            shift: 1.0,
            with_label: false,
            ..Default::default()
        })
        .unwrap();
        let (probs, report) = predictor.predict_batch(&live).unwrap();
        assert_eq!(probs.len(), 150);
        let drifted = report.drifted_columns();
        assert!(drifted.contains(&"heart_rate"));
        assert!(drifted.contains(&"systolic_bp"));
    }

    #[test]
    fn test_snapshot_save_load() {
        let dir = tempdir().unwrap();
        let snap = snapshot();
        snap.save(dir.path()).unwrap();
        let loaded = ReferenceSnapshot::load(dir.path()).unwrap();
        assert_eq!(loaded.model_version, "v1");
        assert_eq!(loaded.imputation, snap.imputation);
        assert_eq!(loaded.table.rows(), snap.table.rows());
        assert_eq!(loaded.table.names(), snap.table.names());
        assert_eq!(loaded.table.numeric("heart_rate"), snap.table.numeric("heart_rate"));
    }
}
