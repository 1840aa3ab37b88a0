//! Core traits for cache operations

mod clock;
mod deferred;
mod metrics;
mod serializer;
mod store;
#[cfg(feature = "tracing")]
mod tracing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use deferred::{DeferredExecutor, DeferredTask};
pub use metrics::{CacheMetrics, CacheOperation, NoopMetrics};
pub use serializer::{JsonSerializer, Serializer};
pub use store::{CacheStore, LockBackend};

#[cfg(feature = "metrics")]
pub use metrics::MetricsCrateAdapter;

#[cfg(feature = "msgpack")]
pub use serializer::MsgPackSerializer;

#[cfg(feature = "tracing")]
pub use self::tracing::TracingMetrics;
