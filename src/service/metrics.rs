//! Generator metrics.
//!
//! Generators report through [`MetricsSink`] so that the hot path carries no
//! knowledge of the metrics backend. [`RecorderMetrics`] forwards to whatever
//! recorder is installed in the `metrics` facade.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counter: successful generations.
pub const GENERATED_TOTAL: &str = "idbuilder_id_generated_total";
/// Counter: clock rollbacks observed.
pub const ROLLBACK_TOTAL: &str = "idbuilder_id_rollback_total";
/// Histogram: rollback magnitude in milliseconds.
pub const ROLLBACK_MS: &str = "idbuilder_id_rollback_ms";
/// Histogram: generation latency in seconds.
pub const GENERATE_LATENCY: &str = "idbuilder_id_generate_latency_seconds";

/// Receives generator events.
pub trait MetricsSink: Send + Sync {
    /// One id was produced in `latency`.
    fn record_generated(&self, latency: Duration);

    /// The clock was observed `rollback_ms` behind the last used timestamp.
    fn record_rollback(&self, rollback_ms: i64);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_generated(&self, _latency: Duration) {}

    fn record_rollback(&self, _rollback_ms: i64) {}
}

/// Emits through the `metrics` facade, tagged with a `mode` label.
#[derive(Debug, Clone)]
pub struct RecorderMetrics {
    mode: &'static str,
}

impl RecorderMetrics {
    /// Create a sink whose series carry `mode` (e.g. `strict`, `striped`).
    #[must_use]
    pub fn new(mode: &'static str) -> Self {
        metrics::describe_counter!(GENERATED_TOTAL, "Identifiers generated");
        metrics::describe_counter!(ROLLBACK_TOTAL, "Clock rollbacks observed by generators");
        metrics::describe_histogram!(ROLLBACK_MS, "Clock rollback magnitude in milliseconds");
        metrics::describe_histogram!(
            GENERATE_LATENCY,
            metrics::Unit::Seconds,
            "Identifier generation latency"
        );
        Self { mode }
    }
}

impl MetricsSink for RecorderMetrics {
    fn record_generated(&self, latency: Duration) {
        metrics::counter!(GENERATED_TOTAL, "mode" => self.mode).increment(1);
        metrics::histogram!(GENERATE_LATENCY, "mode" => self.mode).record(latency.as_secs_f64());
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_rollback(&self, rollback_ms: i64) {
        metrics::counter!(ROLLBACK_TOTAL, "mode" => self.mode).increment(1);
        metrics::histogram!(ROLLBACK_MS, "mode" => self.mode).record(rollback_ms as f64);
    }
}

/// In-process counters, readable at any time.
#[derive(Debug, Default)]
pub struct CountingMetrics {
    generated: AtomicU64,
    rollbacks: AtomicU64,
    max_rollback_ms: AtomicU64,
    latency_nanos: AtomicU64,
}

impl CountingMetrics {
    /// Create zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            generated: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
            max_rollback_ms: AtomicU64::new(0),
            latency_nanos: AtomicU64::new(0),
        }
    }

    /// Number of recorded generations.
    pub fn generated(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    /// Number of recorded rollbacks.
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// Largest rollback seen, in milliseconds.
    pub fn max_rollback_ms(&self) -> u64 {
        self.max_rollback_ms.load(Ordering::Relaxed)
    }

    /// Sum of recorded latencies.
    pub fn total_latency(&self) -> Duration {
        Duration::from_nanos(self.latency_nanos.load(Ordering::Relaxed))
    }
}

impl MetricsSink for CountingMetrics {
    fn record_generated(&self, latency: Duration) {
        self.generated.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.latency_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    fn record_rollback(&self, rollback_ms: i64) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        let magnitude = u64::try_from(rollback_ms).unwrap_or(0);
        self.max_rollback_ms.fetch_max(magnitude, Ordering::Relaxed);
    }
}
