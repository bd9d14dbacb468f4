//! Configuration for a semaphore handle.

use std::time::Duration;

use alder_core::constants::DEFAULT_LOCK_DELAY;
use alder_core::constants::DEFAULT_SESSION_TTL;
use alder_core::constants::MAX_SESSION_TTL;
use alder_core::constants::MIN_SESSION_TTL;

use crate::error::SemaphoreError;

/// Default wait budget for bounded acquisition and for each blocking read.
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(15);

/// Default tolerance for transient store failures.
pub const DEFAULT_MONITOR_RETRIES: u32 = 3;

/// Default pause between monitor retries.
pub const DEFAULT_MONITOR_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Options for a [`crate::DistributedSemaphore`].
///
/// Immutable once the handle is constructed; the handle validates and keeps
/// its own copy.
#[derive(Debug, Clone)]
pub struct SemaphoreOptions {
    /// Key prefix namespacing this semaphore. No trailing slash.
    pub prefix: String,
    /// Maximum concurrent holders. Must be at least 1.
    pub limit: u32,
    /// Label attached to the backing session.
    pub session_name: String,
    /// Session lease length; renewed at half this cadence.
    pub session_ttl: Duration,
    /// Settle window after involuntary loss of a holder's session.
    pub lock_delay: Duration,
    /// Bounded acquisition: fail once `wait_time` has elapsed instead of
    /// blocking indefinitely.
    pub try_once: bool,
    /// Wait budget when `try_once`, and the per-iteration blocking-read
    /// window otherwise.
    pub wait_time: Duration,
    /// Transient store failures tolerated per operation before surfacing.
    pub monitor_retries: u32,
    /// Pause between transient-failure retries.
    pub monitor_retry_delay: Duration,
}

impl SemaphoreOptions {
    /// Options with defaults for the given prefix and limit.
    pub fn new(prefix: impl Into<String>, limit: u32) -> Self {
        Self {
            prefix: prefix.into(),
            limit,
            session_name: String::new(),
            session_ttl: DEFAULT_SESSION_TTL,
            lock_delay: DEFAULT_LOCK_DELAY,
            try_once: false,
            wait_time: DEFAULT_WAIT_TIME,
            monitor_retries: DEFAULT_MONITOR_RETRIES,
            monitor_retry_delay: DEFAULT_MONITOR_RETRY_DELAY,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), SemaphoreError> {
        if self.prefix.is_empty() {
            return Err(SemaphoreError::InvalidOptions {
                reason: "prefix must not be empty".to_string(),
            });
        }
        if self.prefix.ends_with('/') {
            return Err(SemaphoreError::InvalidOptions {
                reason: "prefix must not end with '/'".to_string(),
            });
        }
        if self.limit == 0 {
            return Err(SemaphoreError::InvalidOptions {
                reason: "limit must be at least 1".to_string(),
            });
        }
        if self.session_ttl < MIN_SESSION_TTL || self.session_ttl > MAX_SESSION_TTL {
            return Err(SemaphoreError::InvalidOptions {
                reason: format!(
                    "session_ttl {}ms outside allowed range [{}ms, {}ms]",
                    self.session_ttl.as_millis(),
                    MIN_SESSION_TTL.as_millis(),
                    MAX_SESSION_TTL.as_millis()
                ),
            });
        }
        if self.try_once && self.wait_time.is_zero() {
            return Err(SemaphoreError::InvalidOptions {
                reason: "wait_time must be positive when try_once is set".to_string(),
            });
        }
        Ok(())
    }
}
