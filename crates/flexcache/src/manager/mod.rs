//! Flexible (stale-while-revalidate) cache handle

use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use flexcache_core::{
    CacheMetrics, CacheOperation, CacheStore, Clock, DeferredExecutor, JsonSerializer,
    LockBackend, LockConfig, NoopMetrics, Result, Serializer, StoreStats, SystemClock, Timestamp,
    TtlSpec,
};

mod deferred;
pub use deferred::{DeferredQueue, SpawnExecutor};

mod freshness;
pub use freshness::Freshness;

mod keys;
pub use keys::FlexKeys;

mod lock;
pub use lock::{DEFAULT_POLL_INTERVAL, DistributedLock, LockGuard, owner_token};

mod regenerate;
pub use regenerate::RegenerationExecutor;

pub mod revalidate;

mod scheduler;
pub use scheduler::{CacheId, DedupWindow, RefreshScheduler};

/// Configuration for FlexibleCache
#[derive(Debug, Clone)]
pub struct FlexibleConfig {
    /// Namespace prefix for all keys
    pub namespace: Option<String>,
    /// Dedup window of the scheduler built by the constructors
    pub dedup_window: DedupWindow,
    /// Lock options used when a read passes none
    pub default_lock: LockConfig,
    /// Delay between lock attempts while waiting
    pub lock_poll_interval: Duration,
}

impl Default for FlexibleConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            dedup_window: DedupWindow::Execution,
            default_lock: LockConfig::default(),
            lock_poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl FlexibleConfig {
    /// Create config with namespace
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    /// Set the dedup window
    pub fn dedup_window(mut self, window: DedupWindow) -> Self {
        self.dedup_window = window;
        self
    }

    /// Set the lock options used when a read passes none
    pub fn default_lock(mut self, lock: LockConfig) -> Self {
        self.default_lock = lock;
        self
    }

    /// Set the delay between lock attempts
    pub fn lock_poll_interval(mut self, interval: Duration) -> Self {
        self.lock_poll_interval = interval;
        self
    }
}

/// Cache handle serving stale values while a refresh runs later
///
/// Generic over:
/// - `B`: The store and lock backend (Memory, Redis)
/// - `S`: The serializer (JSON, MessagePack)
/// - `M`: The metrics collector
///
/// Clones share the backend and the refresh scheduler.
pub struct FlexibleCache<B, S = JsonSerializer, M = NoopMetrics>
where
    B: CacheStore + LockBackend,
    S: Serializer,
    M: CacheMetrics,
{
    id: CacheId,
    regenerator: RegenerationExecutor<B, S, M>,
    scheduler: RefreshScheduler,
    config: FlexibleConfig,
}

// Constructors for default serializer/metrics
impl<B: CacheStore + LockBackend> FlexibleCache<B, JsonSerializer, NoopMetrics> {
    /// Create a new FlexibleCache with default JSON serializer and no metrics
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, FlexibleConfig::default())
    }

    /// Create with custom config
    pub fn with_config(backend: B, config: FlexibleConfig) -> Self {
        Self::with_serializer_and_metrics(backend, JsonSerializer, NoopMetrics, config)
    }
}

impl<B, S, M> FlexibleCache<B, S, M>
where
    B: CacheStore + LockBackend,
    S: Serializer,
    M: CacheMetrics,
{
    /// Create a FlexibleCache with custom serializer and metrics
    ///
    /// Refreshes are spawned on the tokio runtime; use
    /// [`with_executor`](Self::with_executor) to defer them differently.
    pub fn with_serializer_and_metrics(
        backend: B,
        serializer: S,
        metrics: M,
        config: FlexibleConfig,
    ) -> Self {
        Self::from_shared(Arc::new(backend), serializer, metrics, config)
    }

    /// Create over a backend that is also used elsewhere
    pub fn from_shared(backend: Arc<B>, serializer: S, metrics: M, config: FlexibleConfig) -> Self {
        let regenerator = RegenerationExecutor::new(
            backend,
            Arc::new(serializer),
            Arc::new(metrics),
            Arc::new(SystemClock),
        )
        .poll_interval(config.lock_poll_interval);
        let scheduler = RefreshScheduler::default().window(config.dedup_window);

        Self {
            id: CacheId::next(),
            regenerator,
            scheduler,
            config,
        }
    }

    /// Use a different clock
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.regenerator = self.regenerator.clock(Arc::new(clock));
        self
    }

    /// Defer refreshes on `executor`, keeping the configured dedup window
    pub fn with_executor(mut self, executor: impl DeferredExecutor) -> Self {
        self.scheduler = RefreshScheduler::new(executor).window(self.config.dedup_window);
        self
    }

    /// Use `scheduler` as is, including its dedup window
    pub fn with_scheduler(mut self, scheduler: RefreshScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// A handle on the same store with its own scheduler
    ///
    /// Bind one per request (or job) so the dedup set lives exactly as long
    /// as that execution context.
    pub fn scoped(&self, scheduler: RefreshScheduler) -> Self {
        self.clone().with_scheduler(scheduler)
    }

    /// Read `key`, serving a stale value while a refresh is queued
    ///
    /// - Missing: `callback` runs now, its value is stored and returned.
    ///   Its errors propagate.
    /// - Fresh: the cached value is returned, nothing is written.
    /// - Stale: the cached value is returned and a refresh is queued unless
    ///   one already was for this key. The refresh runs under the key's lock
    ///   (`lock`, or the configured default) and its errors are only logged.
    pub async fn flexible<T, F, Fut>(
        &self,
        key: &str,
        ttl: impl Into<TtlSpec>,
        callback: F,
        lock: Option<LockConfig>,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let start = Instant::now();
        let ttl = ttl.into();
        let keys = self.keys(key);

        let mut found = self.backend().get_many(&keys.pair()).await?.into_iter();
        let value = found.next().flatten();
        let created = found
            .next()
            .flatten()
            .and_then(|bytes| self.regenerator.decode_created(&keys, &bytes));

        let now = self.regenerator.now();
        let freshness =
            Freshness::classify(created, value.as_deref(), ttl.fresh_secs(now), now);

        let result = match (freshness, value, created) {
            (Freshness::Fresh, Some(bytes), _) => {
                self.metrics().record_fresh_hit(keys.value());
                self.serializer().deserialize(&bytes)?
            }
            (Freshness::Stale, Some(bytes), Some(created)) => {
                self.metrics().record_stale_hit(keys.value());
                let value = self.serializer().deserialize(&bytes)?;
                let lock = lock.unwrap_or_else(|| self.config.default_lock.clone());
                self.schedule_refresh(keys, ttl, callback, lock, created);
                value
            }
            _ => {
                self.metrics().record_miss(keys.value());
                self.compute(&keys, ttl, callback).await?
            }
        };

        self.metrics()
            .record_latency(CacheOperation::Read, start.elapsed());
        Ok(result)
    }

    /// Queue a regeneration for a stale entry
    fn schedule_refresh<T, F, Fut>(
        &self,
        keys: FlexKeys,
        ttl: TtlSpec,
        callback: F,
        lock: LockConfig,
        observed: Timestamp,
    ) where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let regenerator = self.regenerator.clone();
        let task_keys = keys.clone();
        let scheduled = self.scheduler.maybe_schedule(self.id, keys.value(), move || async move {
            if let Err(e) = regenerator
                .run(&task_keys, ttl, callback, &lock, observed)
                .await
            {
                warn!(target: "flexcache", key = %task_keys.value(), error = %e, "Background refresh failed");
            }
        });

        debug!(target: "flexcache", key = %keys.value(), scheduled, "Serving stale value");
        self.metrics().record_schedule(keys.value(), scheduled);
    }

    /// Synchronous recompute on a miss; no lock is taken
    async fn compute<T, F, Fut>(&self, keys: &FlexKeys, ttl: TtlSpec, callback: F) -> Result<T>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let value = callback().await?;
        let bytes = self.serializer().serialize(&value)?;
        self.regenerator.store_pair(keys, bytes, ttl).await?;
        self.metrics()
            .record_latency(CacheOperation::Compute, start.elapsed());
        Ok(value)
    }

    /// Store `value` as freshly computed, e.g. to warm the cache
    pub async fn put_fresh<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: impl Into<TtlSpec>,
    ) -> Result<Option<Timestamp>> {
        let bytes = self.serializer().serialize(value)?;
        self.regenerator
            .store_pair(&self.keys(key), bytes, ttl.into())
            .await
    }

    /// Delete a value and its timestamp
    pub async fn forget(&self, key: &str) -> Result<bool> {
        let deleted = self.backend().delete_many(&self.keys(key).pair()).await?;
        Ok(deleted > 0)
    }

    /// Store keys derived for `key` under this cache's namespace
    pub fn keys(&self, key: &str) -> FlexKeys {
        FlexKeys::new(self.config.namespace.as_deref(), key)
    }

    /// The regeneration lock of `key`
    pub fn lock(&self, key: &str, config: LockConfig) -> DistributedLock<B> {
        DistributedLock::new(self.backend().clone(), self.keys(key).lock(), config)
            .poll_interval(self.config.lock_poll_interval)
    }

    /// Run `body` while holding the regeneration lock of `key`
    pub async fn with_lock<R, F, Fut>(&self, key: &str, config: LockConfig, body: F) -> Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        self.lock(key, config).run(body).await
    }

    /// Release the regeneration lock of `key` if `owner` holds it
    pub async fn release_lock(&self, key: &str, owner: &str) -> Result<bool> {
        self.backend().unlock(self.keys(key).lock(), owner).await
    }

    /// Release the regeneration lock of `key` whoever holds it
    pub async fn force_release(&self, key: &str) -> Result<()> {
        self.backend().force_unlock(self.keys(key).lock()).await
    }

    /// The executor background refreshes run through
    pub fn regenerator(&self) -> &RegenerationExecutor<B, S, M> {
        &self.regenerator
    }

    /// The scheduler deduplicating refreshes for this handle
    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Identity used in refresh episodes
    pub fn id(&self) -> CacheId {
        self.id
    }

    /// Active configuration
    pub fn config(&self) -> &FlexibleConfig {
        &self.config
    }

    /// Get store statistics
    pub async fn stats(&self) -> Result<StoreStats> {
        self.backend().stats().await
    }

    fn backend(&self) -> &Arc<B> {
        self.regenerator.backend()
    }

    fn serializer(&self) -> &S {
        self.regenerator.serializer()
    }

    fn metrics(&self) -> &M {
        self.regenerator.metrics()
    }
}

impl<B, S, M> Clone for FlexibleCache<B, S, M>
where
    B: CacheStore + LockBackend,
    S: Serializer,
    M: CacheMetrics,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            regenerator: self.regenerator.clone(),
            scheduler: self.scheduler.clone(),
            config: self.config.clone(),
        }
    }
}
