//! flexcache: stale-while-revalidate reads over a shared cache store
//!
//! # Features
//!
//! - **Flexible reads**: fresh values are served as is, stale values are
//!   served while one background refresh is queued
//! - **Lock-guarded regeneration** with a double-check, so racing refreshes
//!   of the same stale entry write once
//! - **Pluggable deferral** (per-request queue or tokio spawn)
//! - **Pluggable serialization** (JSON, MessagePack)
//! - **Metrics integration**
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use flexcache::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new(MemoryConfig::default());
//!     let cache = FlexibleCache::new(backend);
//!
//!     // Fresh for 60 seconds, kept (and served stale) for an hour
//!     let total: u64 = cache
//!         .flexible("users:count", (60, 3600), || async { Ok(42) }, None)
//!         .await?;
//!     println!("Users: {}", total);
//!
//!     Ok(())
//! }
//! ```

mod manager;

// Re-export core
pub use flexcache_core::*;

// Re-export storage
#[cfg(feature = "memory")]
pub use flexcache_storage::{MemoryBackend, MemoryConfig};

#[cfg(feature = "redis")]
pub use flexcache_storage::{RedisBackend, RedisConfig};

// Export manager
pub use manager::{
    CacheId, DEFAULT_POLL_INTERVAL, DedupWindow, DeferredQueue, DistributedLock, FlexKeys,
    FlexibleCache, FlexibleConfig, Freshness, LockGuard, RefreshScheduler, RegenerationExecutor,
    SpawnExecutor, owner_token, revalidate,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CacheError, DedupWindow, DeferredQueue, FlexibleCache, FlexibleConfig, JsonSerializer,
        LockConfig, RefreshOutcome, RefreshScheduler, Result, Serializer, SpawnExecutor, Timestamp,
        Ttl, TtlSpec,
    };

    #[cfg(feature = "memory")]
    pub use crate::{MemoryBackend, MemoryConfig};

    #[cfg(feature = "redis")]
    pub use crate::{RedisBackend, RedisConfig};

    #[cfg(feature = "msgpack")]
    pub use crate::MsgPackSerializer;
}
