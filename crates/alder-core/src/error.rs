//! Error types for store operations.

use snafu::Snafu;

/// Errors surfaced by a [`crate::KeyValueStore`] implementation.
///
/// `CompareAndSwapFailed` and `LockDelayActive` are contention signals:
/// callers implementing optimistic loops retry them rather than failing.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum KeyValueStoreError {
    /// Key does not exist.
    #[snafu(display("key '{key}' not found"))]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// Key was empty.
    #[snafu(display("key cannot be empty"))]
    EmptyKey,

    /// Key exceeds the size limit.
    #[snafu(display("key size {size} exceeds maximum of {max} bytes"))]
    KeyTooLarge {
        /// Actual size in bytes.
        size: u32,
        /// Allowed maximum.
        max: u32,
    },

    /// Value exceeds the size limit.
    #[snafu(display("value size {size} exceeds maximum of {max} bytes"))]
    ValueTooLarge {
        /// Actual size in bytes.
        size: u32,
        /// Allowed maximum.
        max: u32,
    },

    /// CAS lost the race: the key's modify revision moved.
    #[snafu(display(
        "compare-and-swap failed for key '{key}': expected revision {expected_revision:?}, found {actual_revision:?}"
    ))]
    CompareAndSwapFailed {
        /// The contended key.
        key: String,
        /// Revision the writer expected (None = key must not exist).
        expected_revision: Option<u64>,
        /// Revision actually present (None = key absent).
        actual_revision: Option<u64>,
    },

    /// Key is inside the settle window left by an involuntarily expired
    /// session and cannot be claimed yet.
    #[snafu(display("lock delay active on key '{key}': {remaining_ms}ms remaining"))]
    LockDelayActive {
        /// The delayed key.
        key: String,
        /// Milliseconds until the window closes.
        remaining_ms: u64,
    },

    /// Session id is unknown (never granted, expired, or destroyed).
    #[snafu(display("session '{session_id}' not found"))]
    SessionNotFound {
        /// The unknown session id.
        session_id: String,
    },

    /// Requested session TTL is outside the store's bounds.
    #[snafu(display("session TTL {ttl_ms}ms outside allowed range [{min_ms}ms, {max_ms}ms]"))]
    InvalidSessionTtl {
        /// Requested TTL in milliseconds.
        ttl_ms: u64,
        /// Minimum allowed.
        min_ms: u64,
        /// Maximum allowed.
        max_ms: u64,
    },

    /// Transient failure reaching the store. Retryable.
    #[snafu(display("store unavailable: {reason}"))]
    Unavailable {
        /// Human-readable description of the failure.
        reason: String,
    },

    /// Operation timed out.
    #[snafu(display("operation timed out after {duration_ms}ms"))]
    Timeout {
        /// Elapsed time in milliseconds.
        duration_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cas_failed_display() {
        let err = KeyValueStoreError::CompareAndSwapFailed {
            key: "svc/.lock".to_string(),
            expected_revision: Some(4),
            actual_revision: Some(7),
        };
        assert_eq!(
            err.to_string(),
            "compare-and-swap failed for key 'svc/.lock': expected revision Some(4), found Some(7)"
        );
    }

    #[test]
    fn lock_delay_display() {
        let err = KeyValueStoreError::LockDelayActive {
            key: "svc/s-1".to_string(),
            remaining_ms: 1500,
        };
        assert_eq!(err.to_string(), "lock delay active on key 'svc/s-1': 1500ms remaining");
    }

    #[test]
    fn unavailable_is_cloneable_and_comparable() {
        let err = KeyValueStoreError::Unavailable {
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.clone(), err);
    }
}
