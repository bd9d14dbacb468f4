//! Ephemeral session primitives.
//!
//! A session is a store-managed lease with a TTL. Keys written bound to a
//! session are deleted by the store when the session expires or is
//! destroyed, giving crash cleanup without cooperation from the crashed
//! client.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::MAX_SESSION_TTL;
use crate::constants::MIN_SESSION_TTL;
use crate::duration::go_duration;
use crate::error::KeyValueStoreError;

/// Opaque session identifier issued by the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What the store does with bound keys when the session expires.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionBehavior {
    /// Delete all bound keys, freeing anything the holder owned.
    #[default]
    Release,
}

/// Request to create a new session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRequest {
    /// Human-readable label for operators.
    pub name: String,
    /// Lease length; the session dies if not renewed within this window.
    #[serde(with = "go_duration")]
    pub ttl: Duration,
    /// Expiry behavior for bound keys.
    pub behavior: SessionBehavior,
    /// Settle window applied to bound keys freed by involuntary expiry,
    /// during which they cannot be reclaimed.
    #[serde(with = "go_duration")]
    pub lock_delay: Duration,
}

/// A granted session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionGrant {
    /// Store-issued session id.
    pub id: SessionId,
    /// Granted TTL (the store may clamp the requested value).
    #[serde(with = "go_duration")]
    pub ttl: Duration,
}

/// Check a requested TTL against the store's bounds.
pub fn validate_session_ttl(ttl: Duration) -> Result<(), KeyValueStoreError> {
    if ttl < MIN_SESSION_TTL || ttl > MAX_SESSION_TTL {
        return Err(KeyValueStoreError::InvalidSessionTtl {
            ttl_ms: ttl.as_millis() as u64,
            min_ms: MIN_SESSION_TTL.as_millis() as u64,
            max_ms: MAX_SESSION_TTL.as_millis() as u64,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_bounds_enforced() {
        assert!(validate_session_ttl(Duration::from_millis(500)).is_err());
        assert!(validate_session_ttl(Duration::from_secs(90_000)).is_err());
        assert!(validate_session_ttl(Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn session_request_wire_form_uses_go_durations() {
        let request = SessionRequest {
            name: "worker-7".to_string(),
            ttl: Duration::from_secs(10),
            behavior: SessionBehavior::Release,
            lock_delay: Duration::from_secs(15),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"10s\""), "unexpected wire form: {json}");
        assert!(json.contains("\"15s\""), "unexpected wire form: {json}");
        assert!(json.contains("\"release\""), "unexpected wire form: {json}");

        let back: SessionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }
}
