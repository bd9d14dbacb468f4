//! Shared state record and key helpers for the semaphore.

use std::collections::BTreeSet;

use alder_core::SessionId;
use serde::Deserialize;
use serde::Serialize;

use crate::error::SemaphoreError;

/// Sentinel key suffix under which the shared state record is stored.
pub const STATE_KEY_SUFFIX: &str = ".lock";

/// Semaphore state stored in the key-value store.
///
/// Serialized as JSON for human readability and debugging. Mutated only via
/// CAS on the record's store-assigned modify revision; every successful CAS
/// observes `holders.len() <= limit`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SemaphoreState {
    /// Maximum concurrent holders.
    pub limit: u32,
    /// Sessions currently holding a slot.
    pub holders: BTreeSet<SessionId>,
}

impl SemaphoreState {
    /// Empty record for a semaphore that does not exist yet.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            holders: BTreeSet::new(),
        }
    }

    /// Decode a stored record; a malformed document is a protocol violation
    /// between clients sharing the prefix and fails fast.
    pub fn decode(key: &str, raw: &str) -> Result<Self, SemaphoreError> {
        serde_json::from_str(raw).map_err(|e| SemaphoreError::CorruptedState {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Encode for a CAS write.
    pub fn encode(&self) -> Result<String, SemaphoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Drop holders with no live contender entry.
    ///
    /// A holder whose session died may linger in the record until the store
    /// finishes its cascading delete; pruning against the observed contender
    /// set self-heals before the eligibility check. Returns the dropped ids.
    pub fn prune_dead_holders(&mut self, live_contenders: &BTreeSet<SessionId>) -> BTreeSet<SessionId> {
        let (live, dead): (BTreeSet<_>, BTreeSet<_>) = std::mem::take(&mut self.holders)
            .into_iter()
            .partition(|h| live_contenders.contains(h));
        self.holders = live;
        dead
    }

    /// True if a slot is free.
    pub fn has_capacity(&self) -> bool {
        self.holders.len() < self.limit as usize
    }
}

/// Key holding the shared state record.
pub fn state_key(prefix: &str) -> String {
    format!("{prefix}/{STATE_KEY_SUFFIX}")
}

/// Contender entry key for a session under this semaphore's prefix.
pub fn contender_key(prefix: &str, session_id: &SessionId) -> String {
    format!("{prefix}/{session_id}")
}

/// Extract the session id from a contender key, if it is one.
pub fn contender_session(prefix: &str, key: &str) -> Option<SessionId> {
    let suffix = key.strip_prefix(prefix)?.strip_prefix('/')?;
    if suffix == STATE_KEY_SUFFIX || suffix.is_empty() || suffix.contains('/') {
        return None;
    }
    Some(SessionId::new(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let mut state = SemaphoreState::new(3);
        state.holders.insert(SessionId::new("s-0001"));
        state.holders.insert(SessionId::new("s-0002"));

        let raw = state.encode().unwrap();
        let back = SemaphoreState::decode("svc/.lock", &raw).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn malformed_record_is_fatal() {
        let err = SemaphoreState::decode("svc/.lock", "{not json").unwrap_err();
        assert!(matches!(err, SemaphoreError::CorruptedState { .. }));
    }

    #[test]
    fn pruning_drops_holders_without_contender_entries() {
        let mut state = SemaphoreState::new(2);
        state.holders.insert(SessionId::new("s-0001"));
        state.holders.insert(SessionId::new("s-0002"));

        let live: BTreeSet<SessionId> = [SessionId::new("s-0002")].into_iter().collect();
        let pruned = state.prune_dead_holders(&live);

        assert_eq!(pruned, [SessionId::new("s-0001")].into_iter().collect());
        assert!(state.holders.contains(&SessionId::new("s-0002")));
        assert!(state.has_capacity());
    }

    #[test]
    fn contender_keys_round_trip_and_exclude_sentinel() {
        let key = contender_key("svc/sem", &SessionId::new("s-0007"));
        assert_eq!(key, "svc/sem/s-0007");
        assert_eq!(contender_session("svc/sem", &key), Some(SessionId::new("s-0007")));
        assert_eq!(contender_session("svc/sem", &state_key("svc/sem")), None);
        assert_eq!(contender_session("svc/sem", "svc/sem/a/b"), None);
    }
}
