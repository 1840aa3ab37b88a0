//! Error types for cache operations

use thiserror::Error;

/// Main error type for all cache operations
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Backend connection failed
    #[error("connection error: {0}")]
    Connection(String),

    /// Backend operation failed
    #[error("backend error: {0}")]
    Backend(String),

    /// The lock could not be acquired within the wait budget
    #[error("timed out acquiring lock: {0}")]
    LockTimeout(String),

    /// The value-producing callback failed
    #[error("callback failed: {0}")]
    Callback(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Wrap any displayable error raised by a value-producing callback
    pub fn callback(err: impl std::fmt::Display) -> Self {
        CacheError::Callback(err.to_string())
    }

    /// Whether this error is a lock acquisition timeout
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, CacheError::LockTimeout(_))
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::LockTimeout("report:lock".to_string());
        assert_eq!(err.to_string(), "timed out acquiring lock: report:lock");

        let err = CacheError::Serialization("failed".to_string());
        assert_eq!(err.to_string(), "serialization error: failed");
    }

    #[test]
    fn test_callback_wraps_display() {
        let io = std::io::Error::other("upstream unavailable");
        let err = CacheError::callback(io);
        assert_eq!(err.to_string(), "callback failed: upstream unavailable");
        assert!(!err.is_lock_timeout());
    }

    #[test]
    fn test_error_clone() {
        let err = CacheError::LockTimeout("k".into());
        let cloned = err.clone();
        assert!(cloned.is_lock_timeout());
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
