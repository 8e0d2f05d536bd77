//! Thread pool metrics.
//!
//! With the `telemetry` feature disabled the same API is kept but records
//! nothing.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSnapshot};

#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    use std::time::Duration;

    #[derive(Debug, Default)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Self {
            Self
        }
        pub fn record_queued(&self) {}
        pub fn record_execution(&self, _: u64) {}
        pub fn record_panic(&self) {}
        pub fn snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct MetricsSnapshot {
        pub uptime: Duration,
        pub items_queued: u64,
        pub items_executed: u64,
        pub items_panicked: u64,
        pub busy_time_ns: u64,
        pub avg_latency_ns: u64,
        pub p50_latency_ns: u64,
        pub p99_latency_ns: u64,
        pub max_latency_ns: u64,
    }
}

#[cfg(not(feature = "telemetry"))]
pub use metrics::{Metrics, MetricsSnapshot};
