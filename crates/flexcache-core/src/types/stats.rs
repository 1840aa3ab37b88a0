//! Store statistics

/// Counters kept by a store backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Keys found on read
    pub hits: u64,
    /// Keys absent or expired on read
    pub misses: u64,
    /// Keys written
    pub writes: u64,
    /// Keys deleted
    pub deletes: u64,
    /// Keys dropped because their TTL elapsed
    pub expirations: u64,
    /// Current number of keys
    pub size: usize,
}

impl StoreStats {
    /// Fraction of key reads that found a value (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total key reads
    pub fn total_reads(&self) -> u64 {
        self.hits + self.misses
    }
}
