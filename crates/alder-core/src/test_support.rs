//! Deterministic in-memory store for tests.
//!
//! Implements the full [`KeyValueStore`] contract (revision-stamped CAS,
//! sessions with cascading delete, lock-delay windows, and long-poll reads)
//! with predictable single-process behavior. Session ids are sequential so
//! test output is stable.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::watch;

use crate::constants::MAX_SCAN_RESULTS;
use crate::error::KeyValueStoreError;
use crate::kv::BlockingReadRequest;
use crate::kv::BlockingReadResult;
use crate::kv::DeleteRequest;
use crate::kv::DeleteResult;
use crate::kv::KeyValueWithRevision;
use crate::kv::ReadRequest;
use crate::kv::ReadResult;
use crate::kv::ScanRequest;
use crate::kv::ScanResult;
use crate::kv::WriteCommand;
use crate::kv::WriteRequest;
use crate::kv::WriteResult;
use crate::kv::validate_write_command;
use crate::session::SessionGrant;
use crate::session::SessionId;
use crate::session::SessionRequest;
use crate::session::validate_session_ttl;
use crate::traits::KeyValueStore;

/// Versioned value with optional session binding.
#[derive(Clone)]
struct VersionedValue {
    value: String,
    version: u64,
    create_revision: u64,
    mod_revision: u64,
    session: Option<SessionId>,
}

struct StoreInner {
    data: BTreeMap<String, VersionedValue>,
    /// Revision of the most recent delete, per key, so blocking reads
    /// observe deletions of keys they are watching.
    tombstones: HashMap<String, u64>,
    sessions: HashMap<SessionId, SessionRequest>,
    /// Settle windows on keys freed by involuntary session expiry.
    delays: HashMap<String, Instant>,
    revision: u64,
    session_counter: u64,
}

impl StoreInner {
    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn last_modified(&self, key: &str) -> u64 {
        self.data
            .get(key)
            .map(|v| v.mod_revision)
            .or_else(|| self.tombstones.get(key).copied())
            .unwrap_or(0)
    }

    fn check_delay(&mut self, key: &str) -> Result<(), KeyValueStoreError> {
        if let Some(until) = self.delays.get(key) {
            let now = Instant::now();
            if now < *until {
                return Err(KeyValueStoreError::LockDelayActive {
                    key: key.to_string(),
                    remaining_ms: until.duration_since(now).as_millis() as u64,
                });
            }
            self.delays.remove(key);
        }
        Ok(())
    }

    fn put(&mut self, key: &str, value: &str, session: Option<SessionId>, revision: u64) {
        match self.data.get_mut(key) {
            Some(existing) => {
                existing.value = value.to_string();
                existing.version += 1;
                existing.mod_revision = revision;
                if session.is_some() {
                    existing.session = session;
                }
            }
            None => {
                self.data.insert(key.to_string(), VersionedValue {
                    value: value.to_string(),
                    version: 1,
                    create_revision: revision,
                    mod_revision: revision,
                    session,
                });
            }
        }
        self.tombstones.remove(key);
    }

    fn remove(&mut self, key: &str, revision: u64) -> bool {
        if self.data.remove(key).is_some() {
            self.tombstones.insert(key.to_string(), revision);
            true
        } else {
            false
        }
    }

    fn to_kv(&self, key: &str) -> Option<KeyValueWithRevision> {
        self.data.get(key).map(|v| KeyValueWithRevision {
            key: key.to_string(),
            value: v.value.clone(),
            version: v.version,
            create_revision: v.create_revision,
            mod_revision: v.mod_revision,
        })
    }
}

/// A deterministic in-memory key-value store for testing.
pub struct DeterministicKeyValueStore {
    inner: Mutex<StoreInner>,
    rev_tx: watch::Sender<u64>,
}

impl Default for DeterministicKeyValueStore {
    fn default() -> Self {
        Self::new_inner()
    }
}

impl DeterministicKeyValueStore {
    /// Create a new deterministic store wrapped in Arc.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::new_inner())
    }

    fn new_inner() -> Self {
        let (rev_tx, _) = watch::channel(0);
        Self {
            inner: Mutex::new(StoreInner {
                data: BTreeMap::new(),
                tombstones: HashMap::new(),
                sessions: HashMap::new(),
                delays: HashMap::new(),
                revision: 0,
                session_counter: 0,
            }),
            rev_tx,
        }
    }

    fn notify(&self, revision: u64) {
        self.rev_tx.send_replace(revision);
    }

    /// True if the session is currently live.
    pub async fn has_session(&self, session_id: &SessionId) -> bool {
        self.inner.lock().await.sessions.contains_key(session_id)
    }

    /// Involuntarily expire a session, as if its TTL lapsed without renewal.
    ///
    /// Bound keys are deleted and stamped with the session's lock-delay
    /// window, during which claim writes fail with `LockDelayActive`.
    pub async fn expire_session(&self, session_id: &SessionId) {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner.sessions.remove(session_id) else {
            return;
        };
        let revision = inner.bump();
        let bound: Vec<String> = inner
            .data
            .iter()
            .filter(|(_, v)| v.session.as_ref() == Some(session_id))
            .map(|(k, _)| k.clone())
            .collect();
        let until = Instant::now() + record.lock_delay;
        for key in bound {
            inner.remove(&key, revision);
            if !record.lock_delay.is_zero() {
                inner.delays.insert(key, until);
            }
        }
        drop(inner);
        self.notify(revision);
    }
}

#[async_trait]
impl KeyValueStore for DeterministicKeyValueStore {
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        let inner = self.inner.lock().await;
        Ok(ReadResult {
            kv: inner.to_kv(&request.key),
        })
    }

    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        validate_write_command(&request.command)?;
        let mut inner = self.inner.lock().await;

        let revision = match &request.command {
            WriteCommand::Set { key, value } => {
                let revision = inner.bump();
                inner.put(key, value, None, revision);
                revision
            }
            WriteCommand::SetWithSession { key, value, session_id } => {
                if !inner.sessions.contains_key(session_id) {
                    return Err(KeyValueStoreError::SessionNotFound {
                        session_id: session_id.to_string(),
                    });
                }
                inner.check_delay(key)?;
                let revision = inner.bump();
                inner.put(key, value, Some(session_id.clone()), revision);
                revision
            }
            WriteCommand::Delete { key } => {
                let revision = inner.bump();
                inner.remove(key, revision);
                revision
            }
            WriteCommand::CompareAndSwap {
                key,
                new_value,
                expected_mod_revision,
            } => {
                inner.check_delay(key)?;
                let actual = inner.data.get(key).map(|v| v.mod_revision);
                if actual != *expected_mod_revision {
                    return Err(KeyValueStoreError::CompareAndSwapFailed {
                        key: key.clone(),
                        expected_revision: *expected_mod_revision,
                        actual_revision: actual,
                    });
                }
                let revision = inner.bump();
                inner.put(key, new_value, None, revision);
                revision
            }
            WriteCommand::CompareAndDelete {
                key,
                expected_mod_revision,
            } => {
                let actual = inner.data.get(key).map(|v| v.mod_revision);
                if actual != Some(*expected_mod_revision) {
                    return Err(KeyValueStoreError::CompareAndSwapFailed {
                        key: key.clone(),
                        expected_revision: Some(*expected_mod_revision),
                        actual_revision: actual,
                    });
                }
                let revision = inner.bump();
                inner.remove(key, revision);
                revision
            }
        };

        drop(inner);
        self.notify(revision);
        Ok(WriteResult { mod_revision: revision })
    }

    async fn delete(&self, request: DeleteRequest) -> Result<DeleteResult, KeyValueStoreError> {
        let mut inner = self.inner.lock().await;
        let revision = inner.bump();
        let deleted = inner.remove(&request.key, revision);
        drop(inner);
        self.notify(revision);
        Ok(DeleteResult {
            key: request.key,
            deleted,
        })
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError> {
        let inner = self.inner.lock().await;
        let limit = request.limit.unwrap_or(MAX_SCAN_RESULTS).min(MAX_SCAN_RESULTS) as usize;

        let start = match request.start_after {
            Some(key) => std::ops::Bound::Excluded(key),
            None => std::ops::Bound::Included(request.prefix.clone()),
        };
        let mut entries: Vec<KeyValueWithRevision> = inner
            .data
            .range((start, std::ops::Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(&request.prefix))
            .map(|(k, v)| KeyValueWithRevision {
                key: k.clone(),
                value: v.value.clone(),
                version: v.version,
                create_revision: v.create_revision,
                mod_revision: v.mod_revision,
            })
            .take(limit + 1)
            .collect();

        let is_truncated = entries.len() > limit;
        if is_truncated {
            entries.truncate(limit);
        }

        Ok(ScanResult {
            count: entries.len() as u32,
            entries,
            is_truncated,
        })
    }

    async fn block_read(&self, request: BlockingReadRequest) -> Result<BlockingReadResult, KeyValueStoreError> {
        let mut rx = self.rev_tx.subscribe();
        let deadline = tokio::time::Instant::now() + request.max_wait;

        loop {
            let (kv, last) = {
                let inner = self.inner.lock().await;
                (inner.to_kv(&request.key), inner.last_modified(&request.key))
            };

            if last > request.since_revision {
                return Ok(BlockingReadResult { kv, revision: last });
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(BlockingReadResult {
                    kv,
                    revision: request.since_revision.max(last),
                });
            }

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Ok(BlockingReadResult {
                            kv,
                            revision: request.since_revision.max(last),
                        });
                    }
                }
            }
        }
    }

    async fn create_session(&self, request: SessionRequest) -> Result<SessionGrant, KeyValueStoreError> {
        validate_session_ttl(request.ttl)?;
        let mut inner = self.inner.lock().await;
        inner.session_counter += 1;
        let id = SessionId::new(format!("s-{:04}", inner.session_counter));
        let ttl = request.ttl;
        inner.sessions.insert(id.clone(), request);
        Ok(SessionGrant { id, ttl })
    }

    async fn renew_session(&self, session_id: &SessionId) -> Result<SessionGrant, KeyValueStoreError> {
        let inner = self.inner.lock().await;
        match inner.sessions.get(session_id) {
            Some(record) => Ok(SessionGrant {
                id: session_id.clone(),
                ttl: record.ttl,
            }),
            None => Err(KeyValueStoreError::SessionNotFound {
                session_id: session_id.to_string(),
            }),
        }
    }

    async fn destroy_session(&self, session_id: &SessionId) -> Result<(), KeyValueStoreError> {
        let mut inner = self.inner.lock().await;
        if inner.sessions.remove(session_id).is_none() {
            return Ok(());
        }
        let revision = inner.bump();
        let bound: Vec<String> = inner
            .data
            .iter()
            .filter(|(_, v)| v.session.as_ref() == Some(session_id))
            .map(|(k, _)| k.clone())
            .collect();
        for key in bound {
            inner.remove(&key, revision);
        }
        drop(inner);
        self.notify(revision);
        Ok(())
    }
}
