// src/error.rs
// Error taxonomy for the cache layer

use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Everything that can go wrong inside the cache layer.
///
/// Only [`CacheError::MissingIdentifier`] ever reaches callers of the record
/// stores; the rest are logged and folded into miss / no-op / fail-open
/// results at the store boundary.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend is not configured, or a recent connect attempt failed and
    /// the reconnect backoff has not elapsed.
    #[error("Cache backend is unavailable")]
    Unavailable,

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Connection attempt timed out after {after:?}")]
    Timeout { after: Duration },

    /// Stored value could not be decoded.
    #[error("Corrupted value at {key}: {reason}")]
    Corruption { key: String, reason: String },

    #[error("Failed to encode payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Caller invoked an operation without a required identifier.
    #[error("Missing required identifier: {field}")]
    MissingIdentifier { field: &'static str },

    /// Backend failure that does not originate from the redis client
    /// (in-memory backend failure injection, unexpected replies).
    #[error("Backend error: {0}")]
    Backend(String),
}

impl CacheError {
    pub fn corruption(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        CacheError::Corruption {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors caused by the caller rather than the backend.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, CacheError::MissingIdentifier { .. })
    }

    /// True when the connection should be discarded and re-created lazily.
    pub fn is_fatal_connection_error(&self) -> bool {
        match self {
            CacheError::Redis(e) => {
                e.is_io_error()
                    || e.is_connection_dropped()
                    || e.is_connection_refusal()
                    || e.is_timeout()
            }
            CacheError::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Rejects empty or whitespace-only identifiers.
pub fn require_id<'a>(field: &'static str, value: &'a str) -> CacheResult<&'a str> {
    if value.trim().is_empty() {
        Err(CacheError::MissingIdentifier { field })
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_id_rejects_blank() {
        let err = require_id("project_id", "   ").unwrap_err();
        assert!(err.is_caller_error());
        assert_eq!(err.to_string(), "Missing required identifier: project_id");
    }

    #[test]
    fn test_require_id_passes_value_through() {
        assert_eq!(require_id("user_id", "u-1").unwrap(), "u-1");
    }

    #[test]
    fn test_backend_errors_are_not_caller_errors() {
        assert!(!CacheError::Unavailable.is_caller_error());
        assert!(!CacheError::corruption("k", "bad json").is_caller_error());
        assert!(CacheError::Timeout { after: Duration::from_secs(1) }.is_fatal_connection_error());
        assert!(!CacheError::Backend("boom".into()).is_fatal_connection_error());
    }
}
