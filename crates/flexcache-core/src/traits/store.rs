//! Cache store and lock backend traits

use async_trait::async_trait;
use std::time::Duration;

use crate::{CacheError, StoreStats};

/// Key-value store the flexible cache reads and writes through
///
/// Values are opaque bytes; expiry is whole seconds. Implementations
/// include the in-memory store and Redis.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Get a value from the store
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Get multiple keys in one round trip
    ///
    /// Returns a vector of results in the same order as the input keys.
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>, CacheError>;

    /// Write multiple entries with a shared expiration
    ///
    /// Backends must apply the batch so that a concurrent `get_many` sees
    /// either all of it or none of it. A zero `ttl` stores without expiration.
    async fn put_many(&self, entries: &[(&str, Vec<u8>)], ttl: Duration) -> Result<(), CacheError>;

    /// Delete multiple keys
    ///
    /// Returns the number of keys that were deleted.
    async fn delete_many(&self, keys: &[&str]) -> Result<u64, CacheError>;

    /// Get store statistics
    async fn stats(&self) -> Result<StoreStats, CacheError>;

    /// Get the number of live keys
    async fn len(&self) -> Result<usize, CacheError>;

    /// Check if the store is empty
    async fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len().await? == 0)
    }
}

/// Named mutual exclusion shared by every process using the same backend
#[async_trait]
pub trait LockBackend: Send + Sync + 'static {
    /// Try once to take `key` for `owner`
    ///
    /// `hold` of `None` keeps the lock until it is released. Returns `false`
    /// if another owner holds an unexpired lock.
    async fn try_lock(&self, key: &str, hold: Option<Duration>, owner: &str) -> Result<bool, CacheError>;

    /// Release `key` if it is held by `owner`
    ///
    /// Returns `true` if the lock was released.
    async fn unlock(&self, key: &str, owner: &str) -> Result<bool, CacheError>;

    /// Release `key` regardless of owner
    async fn force_unlock(&self, key: &str) -> Result<(), CacheError>;
}
