// Modules
pub mod config;
pub mod constants;
pub mod data;
pub mod drift;
pub mod errors;
pub mod features;
pub mod fhir;
pub mod monitor;
pub mod schema;
pub mod service;
pub mod synthetic;
pub mod utils;

// Individual classes, and functions
pub use config::{DriftConfig, JsonIO, PredictorConfig};
pub use data::{Column, FeatureRow, FeatureTable, PatientFeatures};
pub use drift::{detect_drift, ColumnStats, ColumnVerdict, DriftDetector, DriftReport, SkipReason};
pub use errors::ReadmitError;
pub use features::{prepare_features, prepare_features_with, ImputationParams};
pub use service::{Prediction, Predictor, ReferenceSnapshot, RiskLevel, RiskScorer};
