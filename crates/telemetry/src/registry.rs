//! Thread-safe metrics registry: counters plus a duration histogram,
//! rendered in the Prometheus text exposition format.

use crate::model::{Histogram, MetricsSnapshot};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use streambot_core::usage::UsageSink;
use tracing::trace;

/// The process-wide metrics registry.
///
/// Counters are atomics; the histogram and per-platform map sit behind
/// `RwLock`s. A poisoned lock still holds valid counts, so it is used as-is.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    total_tokens: AtomicU64,
    total_records: AtomicU64,
    app_requests: RwLock<BTreeMap<String, u64>>,
    conversation_duration: RwLock<Histogram>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
            total_records: self.total_records.load(Ordering::Relaxed),
            app_requests: self
                .app_requests
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            conversation_duration: self
                .conversation_duration
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render_prometheus(&self) -> String {
        let snap = self.snapshot();
        let mut out = String::new();

        let _ = writeln!(out, "# HELP app_total_tokens Total number of tokens.");
        let _ = writeln!(out, "# TYPE app_total_tokens counter");
        let _ = writeln!(out, "app_total_tokens {}", snap.total_tokens);

        let _ = writeln!(out, "# HELP app_total_records Total number of records.");
        let _ = writeln!(out, "# TYPE app_total_records counter");
        let _ = writeln!(out, "app_total_records {}", snap.total_records);

        let _ = writeln!(out, "# HELP app_request_count Inbound requests per platform.");
        let _ = writeln!(out, "# TYPE app_request_count counter");
        for (app, count) in &snap.app_requests {
            let _ = writeln!(out, "app_request_count{{app=\"{app}\"}} {count}");
        }

        let name = "app_conversation_duration_seconds";
        let hist = &snap.conversation_duration;
        let _ = writeln!(out, "# HELP {name} Duration of conversations in seconds.");
        let _ = writeln!(out, "# TYPE {name} histogram");
        for (bound, count) in hist.cumulative() {
            let le = bound.map_or_else(|| "+Inf".to_string(), |b| b.to_string());
            let _ = writeln!(out, "{name}_bucket{{le=\"{le}\"}} {count}");
        }
        let _ = writeln!(out, "{name}_sum {}", hist.sum);
        let _ = writeln!(out, "{name}_count {}", hist.count);

        out
    }
}

impl UsageSink for MetricsRegistry {
    fn add_tokens(&self, tokens: u64) {
        self.total_tokens.fetch_add(tokens, Ordering::Relaxed);
        trace!(tokens, "Recorded token usage");
    }

    fn observe_conversation(&self, duration: Duration) {
        self.conversation_duration
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(duration.as_secs_f64());
    }

    fn record_turn(&self) {
        self.total_records.fetch_add(1, Ordering::Relaxed);
    }

    fn record_app_request(&self, platform: &str) {
        *self
            .app_requests
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(platform.to_string())
            .or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsRegistry::new();
        metrics.add_tokens(10);
        metrics.add_tokens(5);
        metrics.record_turn();
        metrics.record_app_request("cli");
        metrics.record_app_request("cli");
        metrics.record_app_request("telegram");

        let snap = metrics.snapshot();
        assert_eq!(snap.total_tokens, 15);
        assert_eq!(snap.total_records, 1);
        assert_eq!(snap.app_requests["cli"], 2);
        assert_eq!(snap.app_requests["telegram"], 1);
    }

    #[test]
    fn durations_land_in_histogram() {
        let metrics = MetricsRegistry::new();
        metrics.observe_conversation(Duration::from_millis(300));
        metrics.observe_conversation(Duration::from_secs(42));
        let hist = metrics.snapshot().conversation_duration;
        assert_eq!(hist.count, 2);
        assert_eq!(hist.cumulative().last(), Some(&(None, 2)));
    }

    #[test]
    fn prometheus_rendering() {
        let metrics = MetricsRegistry::new();
        metrics.add_tokens(7);
        metrics.record_app_request("cli");
        metrics.observe_conversation(Duration::from_secs(2));

        let text = metrics.render_prometheus();
        assert!(text.contains("app_total_tokens 7"));
        assert!(text.contains("app_request_count{app=\"cli\"} 1"));
        assert!(text.contains("# TYPE app_conversation_duration_seconds histogram"));
        assert!(text.contains("app_conversation_duration_seconds_bucket{le=\"2.5\"} 1"));
        assert!(text.contains("app_conversation_duration_seconds_bucket{le=\"+Inf\"} 1"));
        assert!(text.contains("app_conversation_duration_seconds_count 1"));
    }

    #[test]
    fn shared_across_threads() {
        let metrics = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        m.add_tokens(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.snapshot().total_tokens, 400);
    }
}
