//! Counters and execution latency for the work queue.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// One hour in nanoseconds; longer work items saturate the histogram.
const MAX_TRACKED_NS: u64 = 3_600_000_000_000;

#[derive(Debug)]
pub struct Metrics {
    items_queued: AtomicU64,
    items_executed: AtomicU64,
    items_panicked: AtomicU64,
    busy_time_ns: AtomicU64,
    latency: RwLock<Option<Histogram<u64>>>,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            items_queued: AtomicU64::new(0),
            items_executed: AtomicU64::new(0),
            items_panicked: AtomicU64::new(0),
            busy_time_ns: AtomicU64::new(0),
            latency: RwLock::new(Histogram::new_with_max(MAX_TRACKED_NS, 3).ok()),
            start_time: Instant::now(),
        }
    }

    pub fn record_queued(&self) {
        self.items_queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one finished work item (panicked or not) and its run time.
    pub fn record_execution(&self, duration_ns: u64) {
        self.items_executed.fetch_add(1, Ordering::Relaxed);
        self.busy_time_ns.fetch_add(duration_ns, Ordering::Relaxed);

        // contended writers drop the sample rather than stall a worker
        if let Some(mut hist) = self.latency.try_write() {
            if let Some(hist) = hist.as_mut() {
                hist.saturating_record(duration_ns);
            }
        }
    }

    pub fn record_panic(&self) {
        self.items_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let hist = self.latency.read();
        let (avg, p50, p99, max) = match hist.as_ref() {
            Some(h) if h.len() > 0 => (
                h.mean() as u64,
                h.value_at_quantile(0.50),
                h.value_at_quantile(0.99),
                h.max(),
            ),
            _ => (0, 0, 0, 0),
        };

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            items_queued: self.items_queued.load(Ordering::Relaxed),
            items_executed: self.items_executed.load(Ordering::Relaxed),
            items_panicked: self.items_panicked.load(Ordering::Relaxed),
            busy_time_ns: self.busy_time_ns.load(Ordering::Relaxed),
            avg_latency_ns: avg,
            p50_latency_ns: p50,
            p99_latency_ns: p99,
            max_latency_ns: max,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
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

impl MetricsSnapshot {
    /// Items queued but not yet finished.
    pub fn backlog(&self) -> u64 {
        self.items_queued.saturating_sub(self.items_executed)
    }

    pub fn items_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.items_executed as f64 / seconds
    }
}
