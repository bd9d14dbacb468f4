//! Key-value operation types.
//!
//! Requests and results for revision-stamped reads, conditional writes, and
//! blocking reads against a strongly-consistent store.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::MAX_KEY_SIZE;
use crate::constants::MAX_VALUE_SIZE;
use crate::error::KeyValueStoreError;
use crate::session::SessionId;

/// Commands for modifying key-value state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WriteCommand {
    /// Set a single key-value pair.
    Set { key: String, value: String },
    /// Set a key-value pair bound to a session; the store deletes the key
    /// when the session expires or is destroyed.
    SetWithSession {
        key: String,
        value: String,
        session_id: SessionId,
    },
    /// Delete a single key.
    Delete { key: String },
    /// Compare-and-swap keyed on the store-assigned modify revision.
    ///
    /// `expected_mod_revision: None` means the key must not exist yet
    /// (create-if-absent).
    CompareAndSwap {
        key: String,
        new_value: String,
        expected_mod_revision: Option<u64>,
    },
    /// Delete the key only if its modify revision still matches.
    CompareAndDelete { key: String, expected_mod_revision: u64 },
}

/// Key-value pair with revision metadata for optimistic concurrency control.
///
/// `mod_revision` is the store-wide revision of the most recent write to
/// this key; conditional writes key on it to detect concurrent mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyValueWithRevision {
    /// The key identifying this entry.
    pub key: String,
    /// The stored value.
    pub value: String,
    /// Key-specific version, incremented on each modification.
    pub version: u64,
    /// Store revision when the key was first created.
    pub create_revision: u64,
    /// Store revision of the most recent modification.
    pub mod_revision: u64,
}

/// Request to perform a write operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteRequest {
    pub command: WriteCommand,
}

impl WriteRequest {
    /// Create a Set command.
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Set {
                key: key.into(),
                value: value.into(),
            },
        }
    }

    /// Create a session-bound Set command.
    pub fn set_with_session(key: impl Into<String>, value: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            command: WriteCommand::SetWithSession {
                key: key.into(),
                value: value.into(),
                session_id,
            },
        }
    }

    /// Create a Delete command.
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Delete { key: key.into() },
        }
    }

    /// Create a CompareAndSwap command keyed on a modify revision.
    pub fn compare_and_swap(
        key: impl Into<String>,
        new_value: impl Into<String>,
        expected_mod_revision: Option<u64>,
    ) -> Self {
        Self {
            command: WriteCommand::CompareAndSwap {
                key: key.into(),
                new_value: new_value.into(),
                expected_mod_revision,
            },
        }
    }

    /// Create a CompareAndDelete command keyed on a modify revision.
    pub fn compare_and_delete(key: impl Into<String>, expected_mod_revision: u64) -> Self {
        Self {
            command: WriteCommand::CompareAndDelete {
                key: key.into(),
                expected_mod_revision,
            },
        }
    }
}

/// Result of a successful write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteResult {
    /// Store revision assigned to the write.
    pub mod_revision: u64,
}

/// Request to read a single key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadRequest {
    pub key: String,
}

impl ReadRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Response from a read operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadResult {
    pub kv: Option<KeyValueWithRevision>,
}

/// Request to delete a key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteRequest {
    pub key: String,
}

impl DeleteRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Result of a delete operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteResult {
    pub key: String,
    /// True if the key existed and was removed.
    pub deleted: bool,
}

/// Request to scan keys with a given prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanRequest {
    pub prefix: String,
    pub limit: Option<u32>,
    /// Exclusive start key for continuing a truncated scan.
    pub start_after: Option<String>,
}

impl ScanRequest {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            limit: None,
            start_after: None,
        }
    }

    /// Continue a scan after the given key.
    pub fn start_after(mut self, key: impl Into<String>) -> Self {
        self.start_after = Some(key.into());
        self
    }
}

/// Response from a scan operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanResult {
    pub entries: Vec<KeyValueWithRevision>,
    pub count: u32,
    pub is_truncated: bool,
}

/// Request for a blocking (long-poll) read.
///
/// Returns as soon as the key's modify revision exceeds `since_revision`,
/// or after `max_wait` with an unchanged revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingReadRequest {
    pub key: String,
    pub since_revision: u64,
    pub max_wait: Duration,
}

/// Response from a blocking read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingReadResult {
    pub kv: Option<KeyValueWithRevision>,
    /// Monotonically non-decreasing cursor revision. Equal to the request's
    /// `since_revision` when the wait timed out without a change.
    pub revision: u64,
}

/// Validate a write command against fixed size limits.
pub fn validate_write_command(command: &WriteCommand) -> Result<(), KeyValueStoreError> {
    let check_key = |key: &str| {
        if key.is_empty() {
            return Err(KeyValueStoreError::EmptyKey);
        }
        let len = key.len();
        if len > MAX_KEY_SIZE as usize {
            Err(KeyValueStoreError::KeyTooLarge {
                size: len as u32,
                max: MAX_KEY_SIZE,
            })
        } else {
            Ok(())
        }
    };

    let check_value = |value: &str| {
        let len = value.len();
        if len > MAX_VALUE_SIZE as usize {
            Err(KeyValueStoreError::ValueTooLarge {
                size: len as u32,
                max: MAX_VALUE_SIZE,
            })
        } else {
            Ok(())
        }
    };

    match command {
        WriteCommand::Set { key, value } | WriteCommand::SetWithSession { key, value, .. } => {
            check_key(key)?;
            check_value(value)?;
        }
        WriteCommand::Delete { key } | WriteCommand::CompareAndDelete { key, .. } => {
            check_key(key)?;
        }
        WriteCommand::CompareAndSwap { key, new_value, .. } => {
            check_key(key)?;
            check_value(new_value)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_rejected() {
        let cmd = WriteCommand::Set {
            key: "".into(),
            value: "v".into(),
        };
        assert!(matches!(validate_write_command(&cmd), Err(KeyValueStoreError::EmptyKey)));
    }

    #[test]
    fn valid_key_accepted() {
        let cmd = WriteCommand::Set {
            key: "k".into(),
            value: "v".into(),
        };
        assert!(validate_write_command(&cmd).is_ok());
    }

    #[test]
    fn oversized_key_rejected() {
        let cmd = WriteCommand::Delete {
            key: "k".repeat(MAX_KEY_SIZE as usize + 1),
        };
        assert!(matches!(
            validate_write_command(&cmd),
            Err(KeyValueStoreError::KeyTooLarge { .. })
        ));
    }
}
