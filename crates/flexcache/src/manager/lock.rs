//! Named distributed lock with guaranteed release

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{Instant, sleep};
use tracing::{trace, warn};

use flexcache_core::{CacheError, LockBackend, LockConfig, Result};

/// Default delay between acquisition attempts while waiting
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Random owner token for acquisitions that did not name one
pub fn owner_token() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// A lock name bound to a backend and its acquisition options
pub struct DistributedLock<L: LockBackend> {
    backend: Arc<L>,
    key: String,
    config: LockConfig,
    poll_interval: Duration,
}

impl<L: LockBackend> DistributedLock<L> {
    /// Create a lock handle; nothing is acquired yet
    pub fn new(backend: Arc<L>, key: impl Into<String>, config: LockConfig) -> Self {
        Self {
            backend,
            key: key.into(),
            config,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the delay between attempts while waiting
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Take the lock, retrying until the configured wait runs out
    ///
    /// Returns [`CacheError::LockTimeout`] when another owner still holds it.
    pub async fn acquire(&self) -> Result<LockGuard<L>> {
        let owner = self.config.owner.clone().unwrap_or_else(owner_token);
        let deadline = Instant::now() + self.config.wait;

        loop {
            if self
                .backend
                .try_lock(&self.key, self.config.expiry(), &owner)
                .await?
            {
                trace!(target: "flexcache", lock = %self.key, owner = %owner, "Lock acquired");
                return Ok(LockGuard {
                    backend: self.backend.clone(),
                    key: self.key.clone(),
                    owner,
                    released: false,
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(CacheError::LockTimeout(self.key.clone()));
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Run `body` while holding the lock
    ///
    /// The lock is released whether `body` succeeds or fails.
    pub async fn run<F, Fut, T>(&self, body: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guard = self.acquire().await?;
        let result = body().await;
        if let Err(e) = guard.release().await {
            warn!(target: "flexcache", lock = %self.key, error = %e, "Lock release failed");
        }
        result
    }
}

/// Proof of a held lock
///
/// Call [`release`](Self::release) when done. A guard dropped without it
/// (cancelled future, panic) schedules the release on the current runtime.
pub struct LockGuard<L: LockBackend> {
    backend: Arc<L>,
    key: String,
    owner: String,
    released: bool,
}

impl<L: LockBackend> LockGuard<L> {
    /// Lock name
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Owner token the lock is held under
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Release the lock now
    pub async fn release(mut self) -> Result<bool> {
        let result = self.backend.unlock(&self.key, &self.owner).await;
        self.released = true;
        result
    }
}

impl<L: LockBackend> Drop for LockGuard<L> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let Ok(handle) = Handle::try_current() else {
            warn!(target: "flexcache", lock = %self.key, "Lock guard dropped outside a runtime; relying on hold expiry");
            return;
        };

        let backend = self.backend.clone();
        let key = std::mem::take(&mut self.key);
        let owner = std::mem::take(&mut self.owner);
        handle.spawn(async move {
            if let Err(e) = backend.unlock(&key, &owner).await {
                warn!(target: "flexcache", lock = %key, error = %e, "Deferred lock release failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexcache_storage::MemoryBackend;

    fn lock(backend: &Arc<MemoryBackend>, config: LockConfig) -> DistributedLock<MemoryBackend> {
        DistributedLock::new(backend.clone(), "report:lock", config)
            .poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let backend = Arc::new(MemoryBackend::with_defaults());

        let guard = lock(&backend, LockConfig::new()).acquire().await.unwrap();
        assert_eq!(backend.lock_owner("report:lock").as_deref(), Some(guard.owner()));

        assert!(guard.release().await.unwrap());
        assert!(backend.lock_owner("report:lock").is_none());
    }

    #[tokio::test]
    async fn test_timeout_when_held() {
        let backend = Arc::new(MemoryBackend::with_defaults());
        backend.try_lock("report:lock", None, "other").await.unwrap();

        let started = Instant::now();
        let err = lock(&backend, LockConfig::new().wait(Duration::from_millis(40)))
            .acquire()
            .await
            .err()
            .unwrap();

        assert!(err.is_lock_timeout());
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(backend.lock_owner("report:lock").as_deref(), Some("other"));
    }

    #[tokio::test]
    async fn test_wait_picks_up_released_lock() {
        let backend = Arc::new(MemoryBackend::with_defaults());
        backend.try_lock("report:lock", None, "other").await.unwrap();

        let releaser = backend.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            releaser.unlock("report:lock", "other").await.unwrap();
        });

        let guard = lock(&backend, LockConfig::new().owner("me").wait(Duration::from_secs(2)))
            .acquire()
            .await
            .unwrap();
        assert_eq!(guard.owner(), "me");
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_releases_on_error() {
        let backend = Arc::new(MemoryBackend::with_defaults());

        let result: Result<()> = lock(&backend, LockConfig::new())
            .run(|| async { Err(CacheError::callback("boom")) })
            .await;

        assert!(matches!(result, Err(CacheError::Callback(_))));
        assert!(backend.lock_owner("report:lock").is_none());
    }

    #[tokio::test]
    async fn test_dropped_guard_releases() {
        let backend = Arc::new(MemoryBackend::with_defaults());

        let guard = lock(&backend, LockConfig::new().owner("me")).acquire().await.unwrap();
        drop(guard);

        for _ in 0..50 {
            if backend.lock_owner("report:lock").is_none() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert!(backend.lock_owner("report:lock").is_none());
    }

    #[test]
    fn test_owner_tokens_differ() {
        assert_ne!(owner_token(), owner_token());
        assert_eq!(owner_token().len(), 32);
    }
}
