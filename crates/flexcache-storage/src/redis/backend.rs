use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;
use parking_lot::RwLock as SyncRwLock;
use redis::{AsyncCommands, Script, Value};
use std::sync::Arc;
use std::time::Duration;

use flexcache_core::{CacheError, CacheStore, LockBackend, Result, StoreStats};

use super::config::RedisConfig;

/// Deletes the lock only while it still belongs to the caller
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Redis store and lock backend
///
/// Multi-put runs as a `MULTI`/`EXEC` pipeline, so a value and its companion
/// timestamp land together. Locks are `SET NX PX` keys holding the owner
/// token, released through a compare-and-delete script.
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool<RedisConnectionManager>,
    config: RedisConfig,
    release: Script,
    stats: Arc<SyncRwLock<StoreStats>>,
}

impl RedisBackend {
    /// Create a new Redis backend
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let manager = RedisConnectionManager::new(config.url.as_str())
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            config,
            release: Script::new(RELEASE_SCRIPT),
            stats: Arc::new(SyncRwLock::new(StoreStats::default())),
        })
    }

    /// Get prefix for a key
    fn prefixed_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// Get connection from pool
    async fn get_connection(&self) -> Result<PooledConnection<'_, RedisConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

#[async_trait]
impl CacheStore for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.get_connection().await?;
        let prefixed = self.prefixed_key(key);

        let bytes: Option<Vec<u8>> = conn
            .get(&prefixed)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        {
            let mut stats = self.stats.write();
            if bytes.is_some() {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
        }
        Ok(bytes)
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.get_connection().await?;

        let prefixed_keys: Vec<String> = keys.iter().map(|k| self.prefixed_key(k)).collect();
        let results: Vec<Option<Vec<u8>>> = conn
            .mget(&prefixed_keys)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        let hits = results.iter().filter(|r| r.is_some()).count() as u64;
        {
            let mut stats = self.stats.write();
            stats.hits += hits;
            stats.misses += results.len() as u64 - hits;
        }

        Ok(results)
    }

    async fn put_many(&self, entries: &[(&str, Vec<u8>)], ttl: Duration) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.get_connection().await?;

        let mut pipe = redis::pipe();
        pipe.atomic();

        for (key, value) in entries {
            let prefixed = self.prefixed_key(key);
            if ttl.is_zero() {
                pipe.set(&prefixed, value);
            } else {
                pipe.set_ex(&prefixed, value, ttl.as_secs().max(1));
            }
        }

        pipe.query_async::<Vec<Value>>(&mut *conn)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        self.stats.write().writes += entries.len() as u64;
        Ok(())
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_connection().await?;

        let prefixed_keys: Vec<String> = keys.iter().map(|k| self.prefixed_key(k)).collect();
        let count: u64 = conn
            .del(&prefixed_keys)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        self.stats.write().deletes += count;
        Ok(count)
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(self.stats.read().clone())
    }

    async fn len(&self) -> Result<usize> {
        let mut conn = self.get_connection().await?;

        let Some(prefix) = &self.config.key_prefix else {
            let size: usize = redis::cmd("DBSIZE")
                .query_async(&mut *conn)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            return Ok(size);
        };

        // O(N) over the prefix; meant for diagnostics, not hot paths
        let match_pattern = format!("{}:*", prefix);
        let mut cursor = 0u64;
        let mut count = 0;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(&match_pattern)
                .arg("COUNT")
                .arg(1000)
                .query_async(&mut *conn)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;

            count += keys.len();
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl LockBackend for RedisBackend {
    async fn try_lock(&self, key: &str, hold: Option<Duration>, owner: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let prefixed = self.prefixed_key(key);

        let mut cmd = redis::cmd("SET");
        cmd.arg(&prefixed).arg(owner).arg("NX");
        if let Some(hold) = hold {
            cmd.arg("PX").arg(hold.as_millis().max(1) as u64);
        }

        // "OK" when taken, nil when someone else holds it
        let reply: Option<String> = cmd
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(reply.is_some())
    }

    async fn unlock(&self, key: &str, owner: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let prefixed = self.prefixed_key(key);

        let mut invocation = self.release.key(&prefixed);
        invocation.arg(owner);
        let released: i64 = invocation
            .invoke_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(released == 1)
    }

    async fn force_unlock(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let prefixed = self.prefixed_key(key);

        let _: u64 = conn
            .del(&prefixed)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }
}
