//! Error types for the distributed semaphore.

use alder_core::KeyValueStoreError;
use snafu::Snafu;

/// Errors from semaphore operations.
///
/// CAS conflicts and lock-delay rejections never appear here: they are
/// expected contention and retried internally.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SemaphoreError {
    /// Acquire was called while the handle already holds a slot.
    #[snafu(display("semaphore already held"))]
    AlreadyHeld,

    /// Bounded acquisition exhausted its wait budget. Recoverable: the
    /// caller may retry.
    #[snafu(display("semaphore not acquired within {waited_ms}ms wait budget"))]
    MaxAttemptsReached {
        /// Wall-clock milliseconds spent waiting.
        waited_ms: u64,
    },

    /// The caller's cancellation token fired.
    #[snafu(display("semaphore operation cancelled"))]
    Cancelled,

    /// The backing session expired or failed renewal; any held slot is gone.
    #[snafu(display("session '{session_id}' lost"))]
    SessionLost {
        /// The lost session id.
        session_id: String,
    },

    /// The stored record was created with a different limit. Incompatible
    /// clients share this prefix; refusing is safer than self-healing.
    #[snafu(display("semaphore limit conflict: configured {configured}, stored {stored}"))]
    LimitConflict {
        /// Limit this handle was configured with.
        configured: u32,
        /// Limit found in the stored record.
        stored: u32,
    },

    /// The stored record could not be decoded.
    #[snafu(display("corrupted semaphore state in key '{key}': {reason}"))]
    CorruptedState {
        /// The state key.
        key: String,
        /// What failed to decode.
        reason: String,
    },

    /// Options failed validation at construction.
    #[snafu(display("invalid semaphore options: {reason}"))]
    InvalidOptions {
        /// Which constraint was violated.
        reason: String,
    },

    /// Transient store failures exhausted the monitor retry budget.
    #[snafu(display("store unavailable after {attempts} attempts: {reason}"))]
    StoreUnavailable {
        /// Attempts made before giving up.
        attempts: u32,
        /// Last failure reason.
        reason: String,
    },

    /// Non-transient storage error.
    #[snafu(display("storage error: {source}"))]
    Storage {
        /// The underlying error.
        source: KeyValueStoreError,
    },

    /// JSON serialization error.
    #[snafu(display("serialization error: {source}"))]
    Serialization {
        /// The underlying error.
        source: serde_json::Error,
    },
}

impl From<KeyValueStoreError> for SemaphoreError {
    fn from(source: KeyValueStoreError) -> Self {
        SemaphoreError::Storage { source }
    }
}

impl From<serde_json::Error> for SemaphoreError {
    fn from(source: serde_json::Error) -> Self {
        SemaphoreError::Serialization { source }
    }
}
