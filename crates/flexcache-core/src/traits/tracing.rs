use crate::{CacheMetrics, CacheOperation, RefreshOutcome};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Metrics adapter that logs events via `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingMetrics {
    /// Service name/prefix (optional)
    service_name: Option<String>,
}

impl TracingMetrics {
    /// Create new tracing metrics adapter
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with service name prefix
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }
}

impl CacheMetrics for TracingMetrics {
    fn record_fresh_hit(&self, key: &str) {
        debug!(
            target: "flexcache",
            event = "fresh_hit",
            key = %key,
            service = ?self.service_name,
            "Fresh hit"
        );
    }

    fn record_stale_hit(&self, key: &str) {
        debug!(
            target: "flexcache",
            event = "stale_hit",
            key = %key,
            service = ?self.service_name,
            "Stale hit, serving cached value"
        );
    }

    fn record_miss(&self, key: &str) {
        debug!(
            target: "flexcache",
            event = "miss",
            key = %key,
            service = ?self.service_name,
            "Miss"
        );
    }

    fn record_schedule(&self, key: &str, scheduled: bool) {
        debug!(
            target: "flexcache",
            event = "schedule",
            key = %key,
            scheduled,
            service = ?self.service_name,
            "Refresh scheduling"
        );
    }

    fn record_refresh(&self, key: &str, outcome: RefreshOutcome) {
        debug!(
            target: "flexcache",
            event = "refresh",
            key = %key,
            outcome = outcome.as_str(),
            service = ?self.service_name,
            "Refresh finished"
        );
    }

    fn record_refresh_failure(&self, key: &str) {
        warn!(
            target: "flexcache",
            event = "refresh_failed",
            key = %key,
            service = ?self.service_name,
            "Refresh callback failed"
        );
    }

    fn record_latency(&self, operation: CacheOperation, duration: Duration) {
        trace!(
            target: "flexcache",
            event = "latency",
            operation = operation.as_str(),
            duration_ms = duration.as_millis() as u64,
            service = ?self.service_name,
            "Operation latency"
        );
    }
}
