//! Data model for usage metrics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default histogram buckets in seconds (the Prometheus client defaults).
pub const DEFAULT_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// A cumulative histogram with fixed upper bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Upper bounds, ascending. `+Inf` is implicit.
    pub bounds: Vec<f64>,
    /// Observation count per bucket (not cumulative); one extra slot for `+Inf`.
    pub counts: Vec<u64>,
    pub sum: f64,
    pub count: u64,
}

impl Histogram {
    pub fn new(bounds: &[f64]) -> Self {
        Self {
            bounds: bounds.to_vec(),
            counts: vec![0; bounds.len() + 1],
            sum: 0.0,
            count: 0,
        }
    }

    pub fn observe(&mut self, value: f64) {
        let slot = self
            .bounds
            .iter()
            .position(|b| value <= *b)
            .unwrap_or(self.bounds.len());
        self.counts[slot] += 1;
        self.sum += value;
        self.count += 1;
    }

    /// Cumulative counts paired with their upper bound (`None` = `+Inf`).
    pub fn cumulative(&self) -> Vec<(Option<f64>, u64)> {
        let mut running = 0;
        self.counts
            .iter()
            .enumerate()
            .map(|(i, c)| {
                running += c;
                (self.bounds.get(i).copied(), running)
            })
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new(&DEFAULT_BUCKETS)
    }
}

/// A point-in-time copy of every metric.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_tokens: u64,
    pub total_records: u64,
    /// Inbound requests per platform
    pub app_requests: BTreeMap<String, u64>,
    pub conversation_duration: Histogram,
}
