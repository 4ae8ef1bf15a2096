//! Usage metrics for StreamBot.
//!
//! Counts tokens, persisted turns and inbound requests, and keeps a
//! histogram of how long conversations take. Implements the engine's
//! `UsageSink` and renders everything in the Prometheus text format.

pub mod model;
pub mod registry;

pub use model::{DEFAULT_BUCKETS, Histogram, MetricsSnapshot};
pub use registry::MetricsRegistry;
