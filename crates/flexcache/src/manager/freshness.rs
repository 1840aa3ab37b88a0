//! Fresh/stale/missing classification

use flexcache_core::Timestamp;

/// State of a flexible entry at read time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Freshness {
    /// Value or companion timestamp absent
    Missing,
    /// Inside the fresh window
    Fresh,
    /// Past the fresh window but still in the store
    Stale,
}

impl Freshness {
    /// Classify an entry read from the store
    ///
    /// A value without its timestamp (or the reverse) is `Missing`, never
    /// stale-with-unknown-age. The entry stops being fresh at exactly
    /// `created_at + fresh_secs`.
    pub fn classify<V: ?Sized>(
        created_at: Option<Timestamp>,
        value: Option<&V>,
        fresh_secs: u64,
        now: Timestamp,
    ) -> Self {
        match (created_at, value) {
            (Some(created_at), Some(_)) => {
                if now < created_at.saturating_add_secs(fresh_secs) {
                    Freshness::Fresh
                } else {
                    Freshness::Stale
                }
            }
            _ => Freshness::Missing,
        }
    }

    /// Whether the cached value can be returned
    pub fn is_servable(&self) -> bool {
        !matches!(self, Freshness::Missing)
    }
}
