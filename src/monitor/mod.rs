//! Monitoring
//!
//! Per-prediction lineage records and live model-health metrics. Both are append-only side
//! channels of the scoring path and never influence a prediction.

pub mod health;
pub mod lineage;

pub use health::{live_metrics, HealthMonitor, LiveMetrics};
pub use lineage::{content_hash, LineageLog, LineageRecord};
