//! Outcome of a background regeneration

/// What a regeneration attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
    /// Callback ran and the new pair was committed
    Refreshed,
    /// Another writer committed a newer timestamp first; nothing written
    Superseded,
    /// The lock was not obtained within the wait budget; nothing written
    LockUnavailable,
}

impl RefreshOutcome {
    /// Get outcome as string label
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Refreshed => "refreshed",
            RefreshOutcome::Superseded => "superseded",
            RefreshOutcome::LockUnavailable => "lock_unavailable",
        }
    }

    /// Whether the store was written
    pub fn wrote(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed)
    }
}
