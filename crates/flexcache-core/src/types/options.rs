//! TTL pairs and lock options

use std::time::Duration;

use super::timestamp::{Timestamp, Ttl};

/// Fresh and stale lifetimes for a flexible entry
///
/// `fresh` bounds how long a value is served without scheduling a refresh.
/// `stale` is the hard expiration written to the store for both the value
/// and its companion timestamp. `stale >= fresh` is expected but not checked.
///
/// Timestamps are whole seconds. With a `fresh` of zero, two refreshes of
/// the same key within one second cannot tell each other apart, and both
/// run their callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlSpec {
    /// Fresh window
    pub fresh: Ttl,
    /// Hard expiration in the store
    pub stale: Ttl,
}

impl TtlSpec {
    /// Create from anything convertible to [`Ttl`]
    pub fn new(fresh: impl Into<Ttl>, stale: impl Into<Ttl>) -> Self {
        Self {
            fresh: fresh.into(),
            stale: stale.into(),
        }
    }

    /// Create from whole seconds
    pub fn secs(fresh: u64, stale: u64) -> Self {
        Self::new(fresh, stale)
    }

    /// Fresh window resolved against `now`
    pub fn fresh_secs(&self, now: Timestamp) -> u64 {
        self.fresh.resolve(now)
    }

    /// Store expiration resolved against `now`
    pub fn stale_secs(&self, now: Timestamp) -> u64 {
        self.stale.resolve(now)
    }
}

impl From<(u64, u64)> for TtlSpec {
    fn from((fresh, stale): (u64, u64)) -> Self {
        Self::secs(fresh, stale)
    }
}

impl From<(Duration, Duration)> for TtlSpec {
    fn from((fresh, stale): (Duration, Duration)) -> Self {
        Self::new(fresh, stale)
    }
}

/// Options for the regeneration lock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockConfig {
    /// How long the lock is held before the backend expires it (zero = until released)
    pub hold: Duration,
    /// Owner token; `None` generates a private token per acquisition
    pub owner: Option<String>,
    /// How long to keep retrying acquisition (zero = single attempt)
    pub wait: Duration,
}

impl LockConfig {
    /// Create default lock options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set hold duration
    pub fn hold(mut self, duration: Duration) -> Self {
        self.hold = duration;
        self
    }

    /// Set hold duration in seconds
    pub fn hold_secs(self, seconds: u64) -> Self {
        self.hold(Duration::from_secs(seconds))
    }

    /// Set the owner token
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Keep retrying acquisition for up to `duration`
    pub fn wait(mut self, duration: Duration) -> Self {
        self.wait = duration;
        self
    }

    /// Hold duration as the backend expects it
    pub fn expiry(&self) -> Option<Duration> {
        (!self.hold.is_zero()).then_some(self.hold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_spec_from_tuple() {
        let ttl: TtlSpec = (60, 3600).into();
        let now = Timestamp::from_secs(0);
        assert_eq!(ttl.fresh_secs(now), 60);
        assert_eq!(ttl.stale_secs(now), 3600);
    }

    #[test]
    fn test_ttl_spec_with_deadline() {
        let ttl = TtlSpec::new(Duration::from_secs(30), Timestamp::from_secs(500));
        let now = Timestamp::from_secs(200);
        assert_eq!(ttl.fresh_secs(now), 30);
        assert_eq!(ttl.stale_secs(now), 300);
    }

    #[test]
    fn test_lock_defaults() {
        let lock = LockConfig::new();
        assert!(lock.owner.is_none());
        assert!(lock.expiry().is_none());
        assert!(lock.wait.is_zero());
    }

    #[test]
    fn test_lock_builder() {
        let lock = LockConfig::new()
            .hold_secs(10)
            .owner("worker-7")
            .wait(Duration::from_millis(250));

        assert_eq!(lock.expiry(), Some(Duration::from_secs(10)));
        assert_eq!(lock.owner.as_deref(), Some("worker-7"));
        assert_eq!(lock.wait, Duration::from_millis(250));
    }
}
