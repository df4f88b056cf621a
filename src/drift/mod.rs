//! Drift Detection Logic
//!
//! This module compares a live feature table against the frozen reference snapshot the model
//! was trained on. Every numeric column gets a two-sample Kolmogorov-Smirnov test and a
//! Population Stability Index, and is flagged when either signal crosses its threshold.

pub mod calculation;
pub mod report;
pub mod stats;

pub use calculation::{detect_drift, drift_decision, DriftDetector};
pub use report::{ColumnStats, ColumnVerdict, DriftReport, PsiBand, Reliability, SkipReason};
pub use stats::{ks_2samp, psi, KsResult, PsiResult};
