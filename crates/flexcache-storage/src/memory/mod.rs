//! In-memory store and lock backend

mod backend;

pub use backend::{MemoryBackend, MemoryConfig};
