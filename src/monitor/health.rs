use log::info;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Summary of a batch of predicted probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveMetrics {
    pub count: usize,
    /// Mean predicted probability.
    pub live_average_confidence: f64,
    /// Population variance of the predicted probabilities.
    pub live_prediction_variance: f64,
}

/// Mean and variance of a batch of probabilities, `None` for an empty batch.
pub fn live_metrics(probs: &[f64]) -> Option<LiveMetrics> {
    if probs.is_empty() {
        return None;
    }
    let n = probs.len() as f64;
    let mean = probs.iter().sum::<f64>() / n;
    let var = probs.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    Some(LiveMetrics {
        count: probs.len(),
        live_average_confidence: mean,
        live_prediction_variance: var,
    })
}

/// Keeps the most recent predictions and reports health metrics over them.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    window: VecDeque<f64>,
    capacity: usize,
}

impl HealthMonitor {
    pub fn new(capacity: usize) -> Self {
        HealthMonitor {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record a prediction and log the metrics over the current window.
    pub fn record(&mut self, prob: f64) -> Option<LiveMetrics> {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(prob);
        let metrics = self.metrics();
        if let Some(m) = metrics {
            info!(
                "live_average_confidence={:.4} live_prediction_variance={:.6} over {} predictions",
                m.live_average_confidence, m.live_prediction_variance, m.count
            );
        }
        metrics
    }

    pub fn metrics(&self) -> Option<LiveMetrics> {
        let (a, b) = self.window.as_slices();
        if b.is_empty() {
            live_metrics(a)
        } else {
            live_metrics(&self.window.iter().copied().collect::<Vec<_>>())
        }
    }
}
