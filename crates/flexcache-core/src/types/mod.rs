//! Core types for cache operations

mod options;
mod outcome;
mod stats;
mod timestamp;

pub use options::{LockConfig, TtlSpec};
pub use outcome::RefreshOutcome;
pub use stats::StoreStats;
pub use timestamp::{Timestamp, Ttl};
