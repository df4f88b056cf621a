//! Configuration
//!
//! Drift detector and prediction service settings, plus the JSON persistence trait
//! shared by every serializable artifact in the crate.
use crate::constants::{EXACT_KS_LIMIT, HIGH_RISK_THRESHOLD, KS_ALPHA, PSI_BUCKETS, PSI_SMOOTHING, PSI_THRESHOLD};
use crate::errors::ReadmitError;
use crate::utils::{validate_float_parameter, validate_positive_float_parameter};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_buckets() -> usize {
    PSI_BUCKETS
}
fn default_smoothing() -> f64 {
    PSI_SMOOTHING
}
fn default_ks_alpha() -> f64 {
    KS_ALPHA
}
fn default_psi_threshold() -> f64 {
    PSI_THRESHOLD
}
fn default_exact_ks_limit() -> usize {
    EXACT_KS_LIMIT
}
fn default_parallel() -> bool {
    false
}

/// Configuration for the [`DriftDetector`](crate::drift::DriftDetector).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriftConfig {
    /// Number of equal-width PSI buckets over the reference range.
    #[serde(default = "default_buckets")]
    pub buckets: usize,
    /// Smoothing constant added to bucket counts, totals and the log argument.
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
    /// KS p-values below this flag drift.
    #[serde(default = "default_ks_alpha")]
    pub ks_alpha: f64,
    /// PSI values above this flag drift.
    #[serde(default = "default_psi_threshold")]
    pub psi_threshold: f64,
    /// Use the exact KS distribution while the larger sample has at most this many values.
    #[serde(default = "default_exact_ks_limit")]
    pub exact_ks_limit: usize,
    /// Evaluate columns on the rayon thread pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl Default for DriftConfig {
    fn default() -> Self {
        DriftConfig {
            buckets: PSI_BUCKETS,
            smoothing: PSI_SMOOTHING,
            ks_alpha: KS_ALPHA,
            psi_threshold: PSI_THRESHOLD,
            exact_ks_limit: EXACT_KS_LIMIT,
            parallel: false,
        }
    }
}

impl DriftConfig {
    pub fn validate(&self) -> Result<(), ReadmitError> {
        if self.buckets == 0 {
            return Err(ReadmitError::InvalidParameter(
                "buckets".to_string(),
                "at least one bucket".to_string(),
                self.buckets.to_string(),
            ));
        }
        if !(self.smoothing > 0.0 && self.smoothing.is_finite()) {
            return Err(ReadmitError::InvalidParameter(
                "smoothing".to_string(),
                "a finite value above 0".to_string(),
                self.smoothing.to_string(),
            ));
        }
        validate_float_parameter(self.ks_alpha, 0.0, 1.0, "ks_alpha")?;
        validate_positive_float_parameter(self.psi_threshold, "psi_threshold")?;
        Ok(())
    }
}

fn default_risk_threshold() -> f64 {
    HIGH_RISK_THRESHOLD
}
fn default_drift_window() -> usize {
    1
}
fn default_health_window() -> usize {
    100
}
fn default_check_drift() -> bool {
    true
}

/// Configuration for the [`Predictor`](crate::service::Predictor).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictorConfig {
    /// Probabilities strictly above this are reported as high risk.
    #[serde(default = "default_risk_threshold")]
    pub risk_threshold: f64,
    /// Number of most recent prepared rows compared against the reference.
    #[serde(default = "default_drift_window")]
    pub drift_window: usize,
    /// Number of most recent probabilities summarized by the health monitor.
    #[serde(default = "default_health_window")]
    pub health_window: usize,
    /// Run the drift check on every request.
    #[serde(default = "default_check_drift")]
    pub check_drift: bool,
    #[serde(default)]
    pub drift: DriftConfig,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        PredictorConfig {
            risk_threshold: HIGH_RISK_THRESHOLD,
            drift_window: 1,
            health_window: default_health_window(),
            check_drift: true,
            drift: DriftConfig::default(),
        }
    }
}

impl PredictorConfig {
    pub fn validate(&self) -> Result<(), ReadmitError> {
        validate_float_parameter(self.risk_threshold, 0.0, 1.0, "risk_threshold")?;
        for (name, window) in [("drift_window", self.drift_window), ("health_window", self.health_window)] {
            if window == 0 {
                return Err(ReadmitError::InvalidParameter(
                    name.to_string(),
                    "a window of at least one row".to_string(),
                    window.to_string(),
                ));
            }
        }
        self.drift.validate()
    }
}

/// IO
pub trait JsonIO: Serialize + DeserializeOwned + Sized {
    /// Save as a json object to a file.
    ///
    /// * `path` - Path to save to.
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ReadmitError> {
        fs::write(path, self.json_dump()?).map_err(|e| ReadmitError::UnableToWrite(e.to_string()))
    }

    /// Dump as a json string.
    fn json_dump(&self) -> Result<String, ReadmitError> {
        serde_json::to_string_pretty(self).map_err(|e| ReadmitError::UnableToWrite(e.to_string()))
    }

    /// Load from a json string.
    ///
    /// * `json_str` - String object, which can be deserialized from json.
    fn from_json(json_str: &str) -> Result<Self, ReadmitError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| ReadmitError::UnableToRead(e.to_string()))
    }

    /// Load from a path to a json object.
    ///
    /// * `path` - Path to load from.
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, ReadmitError> {
        let json_str = fs::read_to_string(path).map_err(|e| ReadmitError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl JsonIO for DriftConfig {}
impl JsonIO for PredictorConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_drift_config_default() {
        let config = DriftConfig::default();
        assert_eq!(config.buckets, 10);
        assert_eq!(config.smoothing, 1e-6);
        assert_eq!(config.ks_alpha, 0.05);
        assert_eq!(config.psi_threshold, 0.1);
        assert!(!config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DriftConfig::from_json(r#"{"buckets": 20}"#).unwrap();
        assert_eq!(config.buckets, 20);
        assert_eq!(config.psi_threshold, 0.1);

        let predictor = PredictorConfig::from_json(r#"{"drift_window": 50}"#).unwrap();
        assert_eq!(predictor.drift_window, 50);
        assert_eq!(predictor.drift, DriftConfig::default());
    }

    #[test]
    fn test_config_io_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("drift.json");
        let config = DriftConfig {
            parallel: true,
            ..Default::default()
        };
        config.save(&file_path).unwrap();
        let config2 = DriftConfig::load(&file_path).unwrap();
        assert_eq!(config, config2);
    }

    #[test]
    fn test_validate() {
        let bad = DriftConfig {
            buckets: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = DriftConfig {
            ks_alpha: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        for smoothing in [0.0, -1e-6, f64::NAN, f64::INFINITY] {
            let bad = DriftConfig {
                smoothing,
                ..Default::default()
            };
            assert!(matches!(bad.validate(), Err(ReadmitError::InvalidParameter(p, _, _)) if p == "smoothing"));
        }
        let bad = PredictorConfig {
            drift_window: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
