//! Fixed limits for store operations and sessions.

use std::time::Duration;

/// Maximum key size in bytes.
pub const MAX_KEY_SIZE: u32 = 1024;

/// Maximum value size in bytes.
pub const MAX_VALUE_SIZE: u32 = 512 * 1024;

/// Maximum entries returned by a single scan.
pub const MAX_SCAN_RESULTS: u32 = 1000;

/// Shortest session TTL the store will grant.
pub const MIN_SESSION_TTL: Duration = Duration::from_secs(1);

/// Longest session TTL the store will grant.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(86_400);

/// Session TTL used when none is configured.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(10);

/// Settle window applied to keys freed by involuntary session expiry.
pub const DEFAULT_LOCK_DELAY: Duration = Duration::from_secs(15);
