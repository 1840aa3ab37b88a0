//! Metrics trait for cache observability

use std::time::Duration;

use crate::RefreshOutcome;

/// Operation for latency tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    /// The `flexible` read as seen by the caller
    Read,
    /// Synchronous recompute on a miss
    Compute,
    /// A background regeneration, lock wait included
    Regenerate,
}

impl CacheOperation {
    /// Get operation as string label
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOperation::Read => "read",
            CacheOperation::Compute => "compute",
            CacheOperation::Regenerate => "regenerate",
        }
    }
}

/// Trait for cache metrics/observability
///
/// Implement this to integrate with your metrics system (Prometheus, StatsD, etc.)
pub trait CacheMetrics: Send + Sync + 'static {
    /// Record a read inside the fresh window
    fn record_fresh_hit(&self, key: &str);

    /// Record a read past the fresh window (stale value served)
    fn record_stale_hit(&self, key: &str);

    /// Record a miss (value or companion timestamp absent)
    fn record_miss(&self, key: &str);

    /// Record whether a stale read queued a refresh
    fn record_schedule(&self, key: &str, scheduled: bool);

    /// Record the result of a regeneration attempt
    fn record_refresh(&self, key: &str, outcome: RefreshOutcome);

    /// Record a regeneration whose callback failed
    fn record_refresh_failure(&self, key: &str);

    /// Record operation latency
    fn record_latency(&self, operation: CacheOperation, duration: Duration);
}

/// No-op metrics implementation (default)
///
/// Zero overhead when metrics are not needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl CacheMetrics for NoopMetrics {
    #[inline]
    fn record_fresh_hit(&self, _key: &str) {}

    #[inline]
    fn record_stale_hit(&self, _key: &str) {}

    #[inline]
    fn record_miss(&self, _key: &str) {}

    #[inline]
    fn record_schedule(&self, _key: &str, _scheduled: bool) {}

    #[inline]
    fn record_refresh(&self, _key: &str, _outcome: RefreshOutcome) {}

    #[inline]
    fn record_refresh_failure(&self, _key: &str) {}

    #[inline]
    fn record_latency(&self, _operation: CacheOperation, _duration: Duration) {}
}

/// Metrics adapter using the `metrics` crate
///
/// # Example
/// ```ignore
/// use flexcache_core::MetricsCrateAdapter;
///
/// let metrics = MetricsCrateAdapter::new("flexcache");
/// // Emits: flexcache_fresh_hits_total, flexcache_refreshes_total{outcome}, ...
/// ```
#[cfg(feature = "metrics")]
#[derive(Debug, Clone)]
pub struct MetricsCrateAdapter {
    prefix: String,
}

#[cfg(feature = "metrics")]
impl MetricsCrateAdapter {
    /// Create a new adapter with the given metric name prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn metric_name(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }
}

#[cfg(feature = "metrics")]
impl CacheMetrics for MetricsCrateAdapter {
    fn record_fresh_hit(&self, _key: &str) {
        metrics::counter!(self.metric_name("fresh_hits_total")).increment(1);
    }

    fn record_stale_hit(&self, _key: &str) {
        metrics::counter!(self.metric_name("stale_hits_total")).increment(1);
    }

    fn record_miss(&self, _key: &str) {
        metrics::counter!(self.metric_name("misses_total")).increment(1);
    }

    fn record_schedule(&self, _key: &str, scheduled: bool) {
        let result = if scheduled { "queued" } else { "deduplicated" };
        metrics::counter!(self.metric_name("schedules_total"), "result" => result).increment(1);
    }

    fn record_refresh(&self, _key: &str, outcome: RefreshOutcome) {
        metrics::counter!(
            self.metric_name("refreshes_total"),
            "outcome" => outcome.as_str()
        )
        .increment(1);
    }

    fn record_refresh_failure(&self, _key: &str) {
        metrics::counter!(self.metric_name("refresh_failures_total")).increment(1);
    }

    fn record_latency(&self, operation: CacheOperation, duration: Duration) {
        metrics::histogram!(
            self.metric_name("operation_duration_seconds"),
            "operation" => operation.as_str()
        )
        .record(duration.as_secs_f64());
    }
}
