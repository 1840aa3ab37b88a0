//! Second-resolution timestamps and TTL normalization

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Whole seconds since the Unix epoch
///
/// This is the representation written under the companion `:created` key,
/// so it serializes as a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The Unix epoch
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Build from whole seconds since the epoch
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Whole seconds since the epoch
    pub const fn as_secs(self) -> u64 {
        self.0
    }

    /// Current wall-clock time, truncated to seconds
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Truncate a `SystemTime` to seconds. Times before the epoch clamp to it.
    pub fn from_system_time(time: SystemTime) -> Self {
        Self(
            time.duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        )
    }

    /// Add whole seconds, saturating at `u64::MAX`
    pub fn saturating_add_secs(self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Add a duration (sub-second part dropped)
    pub fn saturating_add(self, duration: Duration) -> Self {
        self.saturating_add_secs(duration.as_secs())
    }

    /// Seconds from `self` until `later`, zero if `later` is not after `self`
    pub fn secs_until(self, later: Timestamp) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A time-to-live, either relative or as an absolute deadline
///
/// Resolved to whole seconds against "now" at the moment it is used, so a
/// deadline in the past resolves to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Relative lifetime in whole seconds
    Seconds(u64),
    /// Absolute expiry instant
    Until(Timestamp),
}

impl Ttl {
    /// Resolve to whole seconds relative to `now`
    pub fn resolve(self, now: Timestamp) -> u64 {
        match self {
            Ttl::Seconds(secs) => secs,
            Ttl::Until(deadline) => now.secs_until(deadline),
        }
    }
}

impl From<u64> for Ttl {
    fn from(secs: u64) -> Self {
        Ttl::Seconds(secs)
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Ttl::Seconds(duration.as_secs())
    }
}

impl From<Timestamp> for Ttl {
    fn from(deadline: Timestamp) -> Self {
        Ttl::Until(deadline)
    }
}

impl From<SystemTime> for Ttl {
    fn from(deadline: SystemTime) -> Self {
        Ttl::Until(deadline.into())
    }
}
