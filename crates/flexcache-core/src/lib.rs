//! flexcache-core: Core traits and types for the flexcache library
//!
//! This crate holds the collaborator contracts the stale-while-revalidate
//! core is written against (store, lock, clock, deferred executor) together
//! with the value types shared by every backend.

mod error;
mod traits;
mod types;

pub use error::{CacheError, Result};
pub use traits::*;
pub use types::*;
