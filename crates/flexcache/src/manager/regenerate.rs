//! Lock-guarded recompute of one flexible entry

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use flexcache_core::{
    CacheMetrics, CacheOperation, CacheStore, Clock, JsonSerializer, LockBackend, LockConfig,
    NoopMetrics, RefreshOutcome, Result, Serializer, Timestamp, TtlSpec,
};

use super::keys::FlexKeys;
use super::lock::{DEFAULT_POLL_INTERVAL, DistributedLock};
use super::revalidate::{Revalidation, locked_revalidate};

/// Recomputes a value under its lock and writes it with a new timestamp
///
/// Only writes when the companion timestamp still matches the one the
/// caller observed, so racing regenerations of the same stale entry
/// produce a single write.
pub struct RegenerationExecutor<B, S = JsonSerializer, M = NoopMetrics> {
    backend: Arc<B>,
    serializer: Arc<S>,
    metrics: Arc<M>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl<B, S, M> Clone for RegenerationExecutor<B, S, M> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            serializer: self.serializer.clone(),
            metrics: self.metrics.clone(),
            clock: self.clock.clone(),
            poll_interval: self.poll_interval,
        }
    }
}

impl<B, S, M> RegenerationExecutor<B, S, M>
where
    B: CacheStore + LockBackend,
    S: Serializer,
    M: CacheMetrics,
{
    /// Create an executor over shared components
    pub fn new(backend: Arc<B>, serializer: Arc<S>, metrics: Arc<M>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            serializer,
            metrics,
            clock,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Use a different clock for timestamps and TTL resolution
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the delay between lock attempts while waiting
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Recompute the entry at `keys` if it still carries `observed`
    ///
    /// A lock timeout is not an error: it yields
    /// [`RefreshOutcome::LockUnavailable`] and the store is left alone.
    /// Callback and store errors propagate, also leaving the store alone.
    pub async fn run<T, F, Fut>(
        &self,
        keys: &FlexKeys,
        ttl: TtlSpec,
        callback: F,
        lock: &LockConfig,
        observed: Timestamp,
    ) -> Result<RefreshOutcome>
    where
        T: Serialize + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let start = Instant::now();
        let lock = DistributedLock::new(self.backend.clone(), keys.lock(), lock.clone())
            .poll_interval(self.poll_interval);

        let result = locked_revalidate(
            &lock,
            &Some(observed),
            || self.read_created(keys),
            move || async move {
                let value = callback().await?;
                let bytes = self.serializer.serialize(&value)?;
                self.store_pair(keys, bytes, ttl).await
            },
        )
        .await;

        let outcome = match result {
            Ok(Revalidation::Committed(_)) => RefreshOutcome::Refreshed,
            Ok(Revalidation::Superseded) => RefreshOutcome::Superseded,
            Ok(Revalidation::Contended) => RefreshOutcome::LockUnavailable,
            Err(e) => {
                self.metrics.record_refresh_failure(keys.value());
                self.metrics
                    .record_latency(CacheOperation::Regenerate, start.elapsed());
                return Err(e);
            }
        };

        debug!(target: "flexcache", key = %keys.value(), outcome = ?outcome, "Regeneration finished");
        self.metrics.record_refresh(keys.value(), outcome);
        self.metrics
            .record_latency(CacheOperation::Regenerate, start.elapsed());
        Ok(outcome)
    }

    /// Read and decode the companion timestamp
    pub(crate) async fn read_created(&self, keys: &FlexKeys) -> Result<Option<Timestamp>> {
        let bytes = self.backend.get(keys.created()).await?;
        Ok(bytes.and_then(|bytes| self.decode_created(keys, &bytes)))
    }

    /// Decode a companion timestamp; unreadable bytes count as absent
    pub(crate) fn decode_created(&self, keys: &FlexKeys, bytes: &[u8]) -> Option<Timestamp> {
        match self.serializer.deserialize(bytes) {
            Ok(created) => Some(created),
            Err(e) => {
                warn!(target: "flexcache", key = %keys.value(), error = %e, "Unreadable timestamp, treating entry as missing");
                None
            }
        }
    }

    /// Write encoded value and timestamp together under the stale expiration
    ///
    /// A stale lifetime that resolves to zero deletes the pair instead.
    /// Returns the timestamp written, if any.
    pub(crate) async fn store_pair(
        &self,
        keys: &FlexKeys,
        value: Vec<u8>,
        ttl: TtlSpec,
    ) -> Result<Option<Timestamp>> {
        let now = self.clock.now();
        let stale = ttl.stale_secs(now);

        if stale == 0 {
            debug!(target: "flexcache", key = %keys.value(), "Stale lifetime already over, dropping entry");
            self.backend.delete_many(&keys.pair()).await?;
            return Ok(None);
        }

        let created = self.serializer.serialize(&now)?;
        self.backend
            .put_many(
                &[(keys.value(), value), (keys.created(), created)],
                Duration::from_secs(stale),
            )
            .await?;
        Ok(Some(now))
    }

    /// Current time as seen by this executor
    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub(crate) fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub(crate) fn serializer(&self) -> &S {
        &self.serializer
    }

    pub(crate) fn metrics(&self) -> &M {
        &self.metrics
    }
}
