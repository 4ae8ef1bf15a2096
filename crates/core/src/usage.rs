//! UsageSink trait — fire-and-forget usage metrics.
//!
//! The engine reports token consumption, turn completions and request
//! durations here. Implementations must not block and must never fail the
//! request; a metrics hiccup is not the user's problem.

use std::time::Duration;

pub trait UsageSink: Send + Sync {
    /// Add tokens consumed by one model response.
    fn add_tokens(&self, tokens: u64);

    /// Record how long a whole request took.
    fn observe_conversation(&self, duration: Duration);

    /// Count one completed (persisted) turn.
    fn record_turn(&self);

    /// Count one inbound request from the given platform.
    fn record_app_request(&self, platform: &str);
}

/// A sink that drops everything. Used when telemetry is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUsageSink;

impl UsageSink for NoopUsageSink {
    fn add_tokens(&self, _tokens: u64) {}

    fn observe_conversation(&self, _duration: Duration) {}

    fn record_turn(&self) {}

    fn record_app_request(&self, _platform: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn noop_sink_is_object_safe() {
        let sink: Arc<dyn UsageSink> = Arc::new(NoopUsageSink);
        sink.add_tokens(10);
        sink.observe_conversation(Duration::from_millis(5));
        sink.record_turn();
        sink.record_app_request("cli");
    }
}
