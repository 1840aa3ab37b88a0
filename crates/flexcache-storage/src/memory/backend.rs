//! In-memory store and lock backend using DashMap

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use flexcache_core::{CacheStore, Clock, LockBackend, Result, StoreStats, SystemClock, Timestamp};

/// Configuration for the memory backend
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Maximum number of keys (0 = unlimited)
    pub max_capacity: usize,
    /// Capacity reserved up front
    pub initial_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            initial_capacity: 1_024,
        }
    }
}

impl MemoryConfig {
    /// Create config with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            max_capacity: capacity,
            initial_capacity: capacity.min(1_024),
        }
    }

    /// Create config with unlimited capacity
    pub fn unlimited() -> Self {
        Self {
            max_capacity: 0,
            ..Default::default()
        }
    }
}

/// A stored value and its expiry
#[derive(Debug, Clone)]
struct Slot {
    bytes: Vec<u8>,
    expires_at: Option<Timestamp>,
    /// Keys written by the same `put_many`; evicted together
    batch: Arc<[String]>,
}

impl Slot {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// A held lock
#[derive(Debug, Clone)]
struct LockSlot {
    owner: String,
    expires_at: Option<Timestamp>,
}

impl LockSlot {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Internal statistics tracking
#[derive(Debug, Default)]
struct MemoryStats {
    hits: u64,
    misses: u64,
    writes: u64,
    deletes: u64,
    expirations: u64,
}

/// In-memory store and lock backend
///
/// Expiry is judged against the injected [`Clock`], so tests can move time
/// without sleeping. Multi-key reads and writes serialize on a batch lock to
/// keep a value and its companion key consistent.
/// Cloning creates a new handle to the SAME underlying store.
#[derive(Clone)]
pub struct MemoryBackend {
    /// Main data store
    data: Arc<DashMap<String, Slot>>,
    /// Held locks
    locks: Arc<DashMap<String, LockSlot>>,
    /// Readers share, batch writers exclude
    batch: Arc<RwLock<()>>,
    /// Statistics
    stats: Arc<RwLock<MemoryStats>>,
    clock: Arc<dyn Clock>,
    /// Configuration
    config: MemoryConfig,
}

impl MemoryBackend {
    /// Create a new memory backend on the system clock
    pub fn new(config: MemoryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a backend whose expiry follows `clock`
    pub fn with_clock(config: MemoryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            data: Arc::new(DashMap::with_capacity(config.initial_capacity)),
            locks: Arc::new(DashMap::new()),
            batch: Arc::new(RwLock::new(())),
            stats: Arc::new(RwLock::new(MemoryStats::default())),
            clock,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(MemoryConfig::default())
    }

    /// Expiry of a live key, `None` if absent, expired or stored without TTL
    pub fn expires_at(&self, key: &str) -> Option<Timestamp> {
        let now = self.clock.now();
        self.data
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .and_then(|slot| slot.expires_at)
    }

    /// Current owner of an unexpired lock
    pub fn lock_owner(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        self.locks
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| slot.owner.clone())
    }

    /// Drop every expired key and return how many were removed
    pub fn purge_expired(&self) -> usize {
        let _guard = self.batch.write();
        self.purge_expired_locked()
    }

    fn purge_expired_locked(&self) -> usize {
        let now = self.clock.now();
        let before = self.data.len();
        self.data.retain(|_, slot| !slot.is_expired(now));
        let removed = before.saturating_sub(self.data.len());
        self.stats.write().expirations += removed as u64;
        removed
    }

    /// Make room for `incoming` keys; expired keys go first, then whole batches
    fn maybe_evict(&self, incoming: usize) {
        if self.config.max_capacity == 0 {
            return; // Unlimited
        }

        if self.data.len() + incoming <= self.config.max_capacity {
            return;
        }

        self.purge_expired_locked();

        let mut overflow = (self.data.len() + incoming).saturating_sub(self.config.max_capacity);
        // Every victim frees at least itself, so `overflow` victims are enough
        let victims: Vec<Arc<[String]>> = self
            .data
            .iter()
            .take(overflow)
            .map(|entry| entry.batch.clone())
            .collect();

        for batch in victims {
            if overflow == 0 {
                break;
            }
            // Members rewritten since belong to a newer batch and stay
            for member in batch.iter() {
                if self
                    .data
                    .remove_if(member, |_, slot| Arc::ptr_eq(&slot.batch, &batch))
                    .is_some()
                {
                    overflow = overflow.saturating_sub(1);
                }
            }
        }
    }

    /// Read one key; caller holds the batch read guard
    fn read_slot(&self, key: &str, now: Timestamp) -> Option<Vec<u8>> {
        let found = match self.data.get(key) {
            Some(slot) if slot.is_expired(now) => {
                drop(slot);
                self.data.remove_if(key, |_, slot| slot.is_expired(now));
                self.stats.write().expirations += 1;
                None
            }
            Some(slot) => Some(slot.bytes.clone()),
            None => None,
        };

        let mut stats = self.stats.write();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }
}

#[async_trait]
impl CacheStore for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let _guard = self.batch.read();
        Ok(self.read_slot(key, self.clock.now()))
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        let _guard = self.batch.read();
        let now = self.clock.now();
        Ok(keys.iter().map(|key| self.read_slot(key, now)).collect())
    }

    async fn put_many(&self, entries: &[(&str, Vec<u8>)], ttl: Duration) -> Result<()> {
        let _guard = self.batch.write();
        self.maybe_evict(entries.len());

        let expires_at = (!ttl.is_zero()).then(|| self.clock.now().saturating_add(ttl));
        let batch: Arc<[String]> = entries.iter().map(|(key, _)| key.to_string()).collect();
        for (key, bytes) in entries {
            self.data.insert(
                key.to_string(),
                Slot {
                    bytes: bytes.clone(),
                    expires_at,
                    batch: batch.clone(),
                },
            );
        }

        self.stats.write().writes += entries.len() as u64;
        Ok(())
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<u64> {
        let _guard = self.batch.write();
        let count = keys
            .iter()
            .filter(|key| self.data.remove(**key).is_some())
            .count() as u64;
        self.stats.write().deletes += count;
        Ok(count)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let stats = self.stats.read();
        Ok(StoreStats {
            hits: stats.hits,
            misses: stats.misses,
            writes: stats.writes,
            deletes: stats.deletes,
            expirations: stats.expirations,
            size: self.data.len(),
        })
    }

    async fn len(&self) -> Result<usize> {
        let now = self.clock.now();
        Ok(self.data.iter().filter(|slot| !slot.is_expired(now)).count())
    }
}

#[async_trait]
impl LockBackend for MemoryBackend {
    async fn try_lock(&self, key: &str, hold: Option<Duration>, owner: &str) -> Result<bool> {
        let now = self.clock.now();
        // Sub-second holds round up so a held lock never expires on the spot
        let expires_at = hold.map(|hold| {
            let secs = hold.as_secs() + u64::from(hold.subsec_nanos() > 0);
            now.saturating_add_secs(secs)
        });
        let slot = LockSlot {
            owner: owner.to_string(),
            expires_at,
        };

        match self.locks.entry(key.to_string()) {
            Entry::Occupied(mut held) => {
                if held.get().is_expired(now) {
                    held.insert(slot);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(free) => {
                free.insert(slot);
                Ok(true)
            }
        }
    }

    async fn unlock(&self, key: &str, owner: &str) -> Result<bool> {
        Ok(self
            .locks
            .remove_if(key, |_, slot| slot.owner == owner)
            .is_some())
    }

    async fn force_unlock(&self, key: &str) -> Result<()> {
        self.locks.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexcache_core::ManualClock;
    use tokio_test::assert_ok;

    fn backend_at(secs: u64) -> (MemoryBackend, ManualClock) {
        let clock = ManualClock::new(Timestamp::from_secs(secs));
        let backend = MemoryBackend::with_clock(MemoryConfig::default(), Arc::new(clock.clone()));
        (backend, clock)
    }

    #[tokio::test]
    async fn test_put_many_get_many() {
        let (backend, _) = backend_at(1_000);

        backend
            .put_many(
                &[("key1", b"value1".to_vec()), ("key2", b"value2".to_vec())],
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let results = backend.get_many(&["key1", "key2", "key3"]).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_deref(), Some(&b"value1"[..]));
        assert_eq!(results[1].as_deref(), Some(&b"value2"[..]));
        assert!(results[2].is_none());
        assert_eq!(backend.expires_at("key1"), Some(Timestamp::from_secs(1_060)));
    }

    #[tokio::test]
    async fn test_expiry_follows_clock() {
        let (backend, clock) = backend_at(1_000);
        backend
            .put_many(&[("key", b"v".to_vec())], Duration::from_secs(10))
            .await
            .unwrap();

        clock.advance_secs(9);
        assert!(backend.get("key").await.unwrap().is_some());

        clock.advance_secs(1);
        assert!(backend.get("key").await.unwrap().is_none());

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.size, 0);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let (backend, clock) = backend_at(0);
        backend
            .put_many(&[("key", b"v".to_vec())], Duration::ZERO)
            .await
            .unwrap();

        clock.advance_secs(1_000_000);
        assert!(backend.get("key").await.unwrap().is_some());
        assert!(backend.expires_at("key").is_none());
    }

    #[tokio::test]
    async fn test_delete_many() {
        let (backend, _) = backend_at(0);
        backend
            .put_many(
                &[("a", b"1".to_vec()), ("b", b"2".to_vec())],
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let deleted = backend.delete_many(&["a", "b", "missing"]).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(backend.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_stats() {
        let (backend, _) = backend_at(0);
        backend
            .put_many(&[("key1", b"value1".to_vec())], Duration::from_secs(60))
            .await
            .unwrap();
        backend.get("key1").await.unwrap();
        backend.get("nonexistent").await.unwrap();

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
    }

    #[tokio::test]
    async fn test_capacity_prefers_expired() {
        let clock = ManualClock::new(Timestamp::from_secs(0));
        let backend =
            MemoryBackend::with_clock(MemoryConfig::with_capacity(2), Arc::new(clock.clone()));

        backend
            .put_many(&[("old", b"1".to_vec())], Duration::from_secs(5))
            .await
            .unwrap();
        backend
            .put_many(&[("keep", b"2".to_vec())], Duration::from_secs(60))
            .await
            .unwrap();

        clock.advance_secs(10);
        backend
            .put_many(&[("new", b"3".to_vec())], Duration::from_secs(60))
            .await
            .unwrap();

        assert!(backend.get("keep").await.unwrap().is_some());
        assert!(backend.get("new").await.unwrap().is_some());
        assert_eq!(backend.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_capacity_evicts_pairs_together() {
        let backend = MemoryBackend::with_clock(
            MemoryConfig::with_capacity(4),
            Arc::new(ManualClock::new(Timestamp::from_secs(0))),
        );

        for name in ["a", "b"] {
            let created = format!("{}:created", name);
            backend
                .put_many(
                    &[(name, b"v".to_vec()), (created.as_str(), b"0".to_vec())],
                    Duration::from_secs(60),
                )
                .await
                .unwrap();
        }

        // One more key needs a slot; a whole pair goes, never half of one
        backend
            .put_many(&[("c", b"v".to_vec())], Duration::from_secs(60))
            .await
            .unwrap();

        assert!(backend.get("c").await.unwrap().is_some());
        for name in ["a", "b"] {
            let value = backend.get(name).await.unwrap().is_some();
            let created = backend
                .get(&format!("{}:created", name))
                .await
                .unwrap()
                .is_some();
            assert_eq!(value, created, "pair {} split by eviction", name);
        }
        assert_eq!(backend.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_lock_exclusive_until_released() {
        let (backend, _) = backend_at(0);

        assert!(assert_ok!(backend.try_lock("report:lock", None, "a").await));
        assert!(!assert_ok!(backend.try_lock("report:lock", None, "b").await));
        assert_eq!(backend.lock_owner("report:lock").as_deref(), Some("a"));

        // Wrong owner cannot release
        assert!(!assert_ok!(backend.unlock("report:lock", "b").await));
        assert!(assert_ok!(backend.unlock("report:lock", "a").await));
        assert!(assert_ok!(backend.try_lock("report:lock", None, "b").await));
    }

    #[tokio::test]
    async fn test_lock_hold_expires() {
        let (backend, clock) = backend_at(100);

        assert!(
            backend
                .try_lock("k:lock", Some(Duration::from_millis(1_500)), "a")
                .await
                .unwrap()
        );

        clock.advance_secs(1);
        assert!(!backend.try_lock("k:lock", None, "b").await.unwrap());

        clock.advance_secs(1);
        assert!(backend.try_lock("k:lock", None, "b").await.unwrap());
        assert_eq!(backend.lock_owner("k:lock").as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_force_unlock() {
        let (backend, _) = backend_at(0);
        backend.try_lock("k:lock", None, "a").await.unwrap();

        assert_ok!(backend.force_unlock("k:lock").await);
        assert!(backend.lock_owner("k:lock").is_none());
    }

    #[tokio::test]
    async fn test_errors_are_not_raised_for_missing_keys() {
        let (backend, _) = backend_at(0);
        assert_ok!(backend.delete_many(&["nothing"]).await);
        let unlocked = backend.unlock("nothing", "a").await;
        assert!(!assert_ok!(unlocked));
    }
}
