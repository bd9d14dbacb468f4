//! Distributed counting semaphore for limiting concurrent access.
//!
//! Up to `limit` holders across processes share a prefix in the key-value
//! store. The shared record at `<prefix>/.lock` is mutated only via CAS on
//! its modify revision; each contender announces itself under a
//! session-bound key so that a crashed holder's entry disappears with its
//! session. Ineligible contenders wait on a blocking read of the state key
//! instead of polling.
//!
//! No fairness is promised: watch wake-ups race, and a late contender may
//! acquire before an earlier one that is slow to retry.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use alder_core::DeleteRequest;
use alder_core::KeyValueStore;
use alder_core::KeyValueStoreError;
use alder_core::ReadRequest;
use alder_core::ReadResult;
use alder_core::ScanRequest;
use alder_core::SessionId;
use alder_core::WriteRequest;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::SemaphoreError;
use crate::lock_delay::LockDelayTracker;
use crate::options::SemaphoreOptions;
use crate::session::SessionHandle;
use crate::session::SessionManager;
use crate::types::SemaphoreState;
use crate::types::contender_key;
use crate::types::contender_session;
use crate::types::state_key;
use crate::watch::WatchCursor;

/// A handle contending for one slot of a distributed semaphore.
///
/// One handle manages one (session, prefix) pairing; independent handles on
/// the same prefix, including several in one process, are independent
/// contenders, each able to hold a slot up to the shared limit. Within one
/// handle, a single acquire/release/destroy call is active at a time.
pub struct DistributedSemaphore<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
    options: SemaphoreOptions,
    session: Mutex<Option<SessionHandle<S>>>,
    held: AtomicBool,
    /// Validity flag of the session backing the current hold, so `is_held`
    /// can observe renewal failure without taking the async session lock.
    session_valid: std::sync::Mutex<Option<Arc<AtomicBool>>>,
}

impl<S: KeyValueStore + ?Sized + 'static> DistributedSemaphore<S> {
    /// Create a handle for the given prefix. Validates the options.
    pub fn new(store: Arc<S>, options: SemaphoreOptions) -> Result<Self, SemaphoreError> {
        options.validate()?;
        Ok(Self {
            store,
            options,
            session: Mutex::new(None),
            held: AtomicBool::new(false),
            session_valid: std::sync::Mutex::new(None),
        })
    }

    /// The options this handle was constructed with.
    pub fn options(&self) -> &SemaphoreOptions {
        &self.options
    }

    /// True while this handle holds a slot backed by a live session.
    ///
    /// Flips to false on its own when the background renewal task loses the
    /// session.
    pub fn is_held(&self) -> bool {
        if !self.held.load(Ordering::SeqCst) {
            return false;
        }
        match self.current_valid_flag() {
            Some(flag) if flag.load(Ordering::SeqCst) => true,
            _ => {
                self.held.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Acquire a slot, blocking until one is free.
    ///
    /// With `try_once`, gives up with [`SemaphoreError::MaxAttemptsReached`]
    /// once `wait_time` has elapsed without success, never earlier.
    /// Cancellation aborts an in-flight wait promptly and removes this
    /// handle's contender entry best-effort.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), SemaphoreError> {
        let mut session_slot = self.session.lock().await;

        if self.held.load(Ordering::SeqCst) {
            if session_slot.as_ref().is_some_and(|s| s.is_valid()) {
                return Err(SemaphoreError::AlreadyHeld);
            }
            // Lost the backing session since the last acquire.
            self.held.store(false, Ordering::SeqCst);
        }

        let session_id = self.ensure_session(&mut session_slot).await?;
        self.write_contender(&session_id, cancel).await?;

        let result = self.acquire_loop(&session_id, cancel).await;
        if result.is_err() {
            self.remove_contender_best_effort(&session_id).await;
        }
        result
    }

    /// Release the held slot. No-op when not held, keeping release
    /// idempotent. The session is kept so the handle can re-acquire.
    pub async fn release(&self) -> Result<(), SemaphoreError> {
        let mut session_slot = self.session.lock().await;
        self.release_locked(&mut session_slot).await
    }

    /// Tear down this handle's participation: release any held slot, remove
    /// the contender entry, delete the state record if no contenders remain,
    /// and destroy the owned session.
    pub async fn destroy(&self) -> Result<(), SemaphoreError> {
        let mut session_slot = self.session.lock().await;
        self.release_locked(&mut session_slot).await?;

        if let Some(session_id) = session_slot.as_ref().map(|s| s.id().clone()) {
            self.store
                .delete(DeleteRequest::new(contender_key(&self.options.prefix, &session_id)))
                .await?;
        }

        let live = self.scan_contenders().await?;
        if live.is_empty() {
            let key = state_key(&self.options.prefix);
            let read = self.read_with_retries(&key).await?;
            if let Some(kv) = read.kv {
                match self
                    .store
                    .write(WriteRequest::compare_and_delete(key.as_str(), kv.mod_revision))
                    .await
                {
                    Ok(_) => debug!(prefix = %self.options.prefix, "semaphore record destroyed"),
                    Err(KeyValueStoreError::CompareAndSwapFailed { .. }) => {
                        // A new contender appeared; the record stays.
                        debug!(prefix = %self.options.prefix, "record changed under destroy, leaving in place");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        } else {
            debug!(
                prefix = %self.options.prefix,
                contenders = live.len(),
                "contenders remain, leaving record in place"
            );
        }

        if let Some(handle) = session_slot.take() {
            self.set_valid_flag(None);
            handle.destroy().await?;
        }
        Ok(())
    }

    /// Retry-and-wait loop attempting to join the holder set.
    async fn acquire_loop(&self, session_id: &SessionId, cancel: &CancellationToken) -> Result<(), SemaphoreError> {
        let key = state_key(&self.options.prefix);
        let mut cursor = WatchCursor::new(Arc::clone(&self.store), key.clone());
        let mut settle = LockDelayTracker::new(self.options.lock_delay);
        let mut seen_dead: BTreeSet<SessionId> = BTreeSet::new();
        let mut unavailable_attempts = 0u32;

        let start = Instant::now();
        let deadline = self.options.try_once.then(|| start + self.options.wait_time);

        loop {
            if cancel.is_cancelled() {
                return Err(SemaphoreError::Cancelled);
            }
            // A dead session must not be CAS'd into the holder set; other
            // contenders would immediately prune it.
            if !self.current_valid_flag().is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                return Err(SemaphoreError::SessionLost {
                    session_id: session_id.to_string(),
                });
            }

            // Fresh read of the record and its revision.
            let read = self.read_with_retries(&key).await?;
            let (mut state, expected_revision) = match read.kv {
                Some(kv) => {
                    cursor.observe(kv.mod_revision);
                    (SemaphoreState::decode(&key, &kv.value)?, Some(kv.mod_revision))
                }
                None => (SemaphoreState::new(self.options.limit), None),
            };
            if state.limit != self.options.limit {
                return Err(SemaphoreError::LimitConflict {
                    configured: self.options.limit,
                    stored: state.limit,
                });
            }

            // Liveness: holders without a contender entry are stale.
            let live = self.scan_contenders().await?;
            let removed = state.prune_dead_holders(&live);
            let newly_dead: Vec<&SessionId> = removed.iter().filter(|id| !seen_dead.contains(*id)).collect();
            if !newly_dead.is_empty() {
                debug!(
                    prefix = %self.options.prefix,
                    pruned = newly_dead.len(),
                    "pruned holders with no contender entry, settle window armed"
                );
                settle.arm();
                seen_dead.extend(removed.iter().cloned());
            }

            if state.holders.contains(session_id) {
                self.held.store(true, Ordering::SeqCst);
                return Ok(());
            }

            let mut store_delay = None;
            if state.has_capacity() && !settle.is_active() {
                state.holders.insert(session_id.clone());
                let body = state.encode()?;
                match self
                    .store
                    .write(WriteRequest::compare_and_swap(key.as_str(), body, expected_revision))
                    .await
                {
                    Ok(result) => {
                        cursor.observe(result.mod_revision);
                        self.held.store(true, Ordering::SeqCst);
                        info!(
                            prefix = %self.options.prefix,
                            session = %session_id,
                            holders = state.holders.len(),
                            "semaphore slot acquired"
                        );
                        return Ok(());
                    }
                    Err(KeyValueStoreError::CompareAndSwapFailed { .. }) => {
                        // Expected contention: a concurrent writer moved the
                        // record. Re-read immediately.
                        unavailable_attempts = 0;
                        continue;
                    }
                    Err(KeyValueStoreError::LockDelayActive { remaining_ms, .. }) => {
                        // The store is still settling a freed slot; wait it
                        // out like any other contention.
                        store_delay = Some(Duration::from_millis(remaining_ms));
                    }
                    Err(KeyValueStoreError::Unavailable { reason }) => {
                        if unavailable_attempts >= self.options.monitor_retries {
                            return Err(SemaphoreError::StoreUnavailable {
                                attempts: unavailable_attempts + 1,
                                reason,
                            });
                        }
                        unavailable_attempts += 1;
                        warn!(%reason, attempt = unavailable_attempts, "state CAS failed, retrying");
                        tokio::time::sleep(self.options.monitor_retry_delay).await;
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            // Ineligible: wait for the record to change, bounded by the
            // remaining budget and any open settle window.
            let mut max_wait = self.options.wait_time;
            if let Some(d) = deadline {
                let now = Instant::now();
                if now >= d {
                    return Err(SemaphoreError::MaxAttemptsReached {
                        waited_ms: start.elapsed().as_millis() as u64,
                    });
                }
                max_wait = max_wait.min(d - now);
            }
            if let Some(remaining) = settle.pending() {
                max_wait = max_wait.min(remaining);
            }
            if let Some(remaining) = store_delay {
                max_wait = max_wait.min(remaining);
            }

            cursor.wait(max_wait, cancel).await?;
        }
    }

    /// Remove this session from the holder set and delete the contender
    /// entry. Caller holds the session lock.
    async fn release_locked(&self, session_slot: &mut Option<SessionHandle<S>>) -> Result<(), SemaphoreError> {
        if !self.held.load(Ordering::SeqCst) {
            return Ok(());
        }
        let Some(session) = session_slot.as_ref() else {
            self.held.store(false, Ordering::SeqCst);
            return Ok(());
        };
        if !session.is_valid() {
            // The slot is already gone with the session; the store's
            // cascading delete removed the contender entry.
            self.held.store(false, Ordering::SeqCst);
            return Ok(());
        }
        let session_id = session.id().clone();
        let key = state_key(&self.options.prefix);

        // Only our own entry is being removed, so CAS conflicts here are
        // transient and always resolvable.
        loop {
            let read = self.read_with_retries(&key).await?;
            let Some(kv) = read.kv else {
                break;
            };
            let mut state = SemaphoreState::decode(&key, &kv.value)?;
            if !state.holders.remove(&session_id) {
                break;
            }
            let body = state.encode()?;
            match self
                .store
                .write(WriteRequest::compare_and_swap(key.as_str(), body, Some(kv.mod_revision)))
                .await
            {
                Ok(_) => {
                    info!(prefix = %self.options.prefix, session = %session_id, "semaphore slot released");
                    break;
                }
                Err(KeyValueStoreError::CompareAndSwapFailed { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        self.held.store(false, Ordering::SeqCst);
        self.store
            .delete(DeleteRequest::new(contender_key(&self.options.prefix, &session_id)))
            .await?;
        Ok(())
    }

    /// Ensure a live session exists, creating one (with its renewal task)
    /// when the slot is empty or the previous session was lost.
    async fn ensure_session(
        &self,
        session_slot: &mut Option<SessionHandle<S>>,
    ) -> Result<SessionId, SemaphoreError> {
        if let Some(handle) = session_slot.as_ref() {
            if handle.is_valid() {
                return Ok(handle.id().clone());
            }
            // Invalid session: its renewal task has already stopped and the
            // store reclaims the lease; drop our side.
            *session_slot = None;
            self.set_valid_flag(None);
        }

        let handle = SessionManager::new(Arc::clone(&self.store)).create(&self.options).await?;
        let id = handle.id().clone();
        self.set_valid_flag(Some(handle.valid_flag()));
        *session_slot = Some(handle);
        Ok(id)
    }

    /// Write or refresh this session's contender entry.
    async fn write_contender(&self, session_id: &SessionId, cancel: &CancellationToken) -> Result<(), SemaphoreError> {
        let key = contender_key(&self.options.prefix, session_id);
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(SemaphoreError::Cancelled);
            }
            match self
                .store
                .write(WriteRequest::set_with_session(
                    key.as_str(),
                    self.options.session_name.as_str(),
                    session_id.clone(),
                ))
                .await
            {
                Ok(_) => return Ok(()),
                Err(KeyValueStoreError::LockDelayActive { remaining_ms, .. }) => {
                    // Our key path is still settling from a previous life;
                    // contention, not failure.
                    tokio::time::sleep(Duration::from_millis(remaining_ms.clamp(10, 1_000))).await;
                }
                Err(KeyValueStoreError::Unavailable { reason }) if attempt < self.options.monitor_retries => {
                    attempt += 1;
                    warn!(%reason, attempt, "contender write failed, retrying");
                    tokio::time::sleep(self.options.monitor_retry_delay).await;
                }
                Err(KeyValueStoreError::Unavailable { reason }) => {
                    return Err(SemaphoreError::StoreUnavailable {
                        attempts: attempt + 1,
                        reason,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Session ids with a live contender entry under the prefix.
    ///
    /// Pages past the store's scan cap; a live holder beyond the first page
    /// must not be mistaken for dead and pruned.
    async fn scan_contenders(&self) -> Result<BTreeSet<SessionId>, SemaphoreError> {
        let scan_prefix = format!("{}/", self.options.prefix);
        let mut contenders = BTreeSet::new();
        let mut start_after: Option<String> = None;
        let mut attempt = 0u32;
        loop {
            let mut request = ScanRequest::new(scan_prefix.as_str());
            if let Some(key) = &start_after {
                request = request.start_after(key.as_str());
            }
            match self.store.scan(request).await {
                Ok(result) => {
                    contenders.extend(
                        result
                            .entries
                            .iter()
                            .filter_map(|e| contender_session(&self.options.prefix, &e.key)),
                    );
                    let next = result.entries.last().map(|e| e.key.clone());
                    if !result.is_truncated || next.is_none() {
                        return Ok(contenders);
                    }
                    start_after = next;
                    attempt = 0;
                }
                Err(KeyValueStoreError::Unavailable { reason }) if attempt < self.options.monitor_retries => {
                    attempt += 1;
                    warn!(%reason, attempt, "contender scan failed, retrying");
                    tokio::time::sleep(self.options.monitor_retry_delay).await;
                }
                Err(KeyValueStoreError::Unavailable { reason }) => {
                    return Err(SemaphoreError::StoreUnavailable {
                        attempts: attempt + 1,
                        reason,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read a key, retrying transient failures within the monitor budget.
    async fn read_with_retries(&self, key: &str) -> Result<ReadResult, SemaphoreError> {
        let mut attempt = 0u32;
        loop {
            match self.store.read(ReadRequest::new(key)).await {
                Ok(result) => return Ok(result),
                Err(KeyValueStoreError::Unavailable { reason }) if attempt < self.options.monitor_retries => {
                    attempt += 1;
                    warn!(%reason, attempt, key, "read failed, retrying");
                    tokio::time::sleep(self.options.monitor_retry_delay).await;
                }
                Err(KeyValueStoreError::Unavailable { reason }) => {
                    return Err(SemaphoreError::StoreUnavailable {
                        attempts: attempt + 1,
                        reason,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Best-effort contender cleanup on abort paths; failure is logged and
    /// swallowed so the original error reaches the caller.
    async fn remove_contender_best_effort(&self, session_id: &SessionId) {
        let key = contender_key(&self.options.prefix, session_id);
        if let Err(e) = self.store.delete(DeleteRequest::new(key)).await {
            warn!(error = %e, session = %session_id, "failed to remove contender entry during abort");
        }
    }

    fn current_valid_flag(&self) -> Option<Arc<AtomicBool>> {
        self.session_valid.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_valid_flag(&self, flag: Option<Arc<AtomicBool>>) {
        *self.session_valid.lock().unwrap_or_else(PoisonError::into_inner) = flag;
    }
}

#[cfg(test)]
mod tests {
    use alder_core::test_support::DeterministicKeyValueStore;

    use super::*;

    fn options(prefix: &str, limit: u32) -> SemaphoreOptions {
        let mut opts = SemaphoreOptions::new(prefix, limit);
        opts.session_ttl = Duration::from_secs(1);
        opts.lock_delay = Duration::ZERO;
        opts.wait_time = Duration::from_millis(200);
        opts
    }

    #[tokio::test]
    async fn acquire_and_release() {
        let store = DeterministicKeyValueStore::new();
        let sem = DistributedSemaphore::new(store.clone(), options("svc/sem", 2)).unwrap();
        let cancel = CancellationToken::new();

        assert!(!sem.is_held());
        sem.acquire(&cancel).await.unwrap();
        assert!(sem.is_held());

        sem.release().await.unwrap();
        assert!(!sem.is_held());
        sem.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn acquire_while_held_is_an_error() {
        let store = DeterministicKeyValueStore::new();
        let sem = DistributedSemaphore::new(store.clone(), options("svc/sem", 1)).unwrap();
        let cancel = CancellationToken::new();

        sem.acquire(&cancel).await.unwrap();
        let err = sem.acquire(&cancel).await.unwrap_err();
        assert!(matches!(err, SemaphoreError::AlreadyHeld));

        sem.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn double_release_is_noop() {
        let store = DeterministicKeyValueStore::new();
        let sem = DistributedSemaphore::new(store.clone(), options("svc/sem", 1)).unwrap();
        let cancel = CancellationToken::new();

        sem.acquire(&cancel).await.unwrap();
        sem.release().await.unwrap();
        sem.release().await.unwrap();
        assert!(!sem.is_held());

        // The record survived both releases with an empty holder set.
        let key = state_key("svc/sem");
        let kv = store.read(ReadRequest::new(key.as_str())).await.unwrap().kv.unwrap();
        let state = SemaphoreState::decode(&key, &kv.value).unwrap();
        assert!(state.holders.is_empty());

        sem.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn limit_conflict_fails_fast() {
        let store = DeterministicKeyValueStore::new();
        let cancel = CancellationToken::new();

        let first = DistributedSemaphore::new(store.clone(), options("svc/sem", 2)).unwrap();
        first.acquire(&cancel).await.unwrap();

        let other = DistributedSemaphore::new(store.clone(), options("svc/sem", 3)).unwrap();
        let err = other.acquire(&cancel).await.unwrap_err();
        assert!(matches!(err, SemaphoreError::LimitConflict { configured: 3, stored: 2 }));

        first.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn corrupted_record_fails_fast() {
        let store = DeterministicKeyValueStore::new();
        store
            .write(WriteRequest::set(state_key("svc/sem").as_str(), "{not json"))
            .await
            .unwrap();

        let sem = DistributedSemaphore::new(store.clone(), options("svc/sem", 1)).unwrap();
        let cancel = CancellationToken::new();
        let err = sem.acquire(&cancel).await.unwrap_err();
        assert!(matches!(err, SemaphoreError::CorruptedState { .. }));
    }

    #[tokio::test]
    async fn stale_holder_is_pruned_and_slot_reclaimed() {
        let store = DeterministicKeyValueStore::new();
        let key = state_key("svc/sem");

        // A holder that crashed without its session: present in the record,
        // no contender entry.
        let mut ghost_state = SemaphoreState::new(1);
        ghost_state.holders.insert(SessionId::new("s-ghost"));
        store
            .write(WriteRequest::set(key.as_str(), &ghost_state.encode().unwrap()))
            .await
            .unwrap();

        let sem = DistributedSemaphore::new(store.clone(), options("svc/sem", 1)).unwrap();
        let cancel = CancellationToken::new();
        sem.acquire(&cancel).await.unwrap();
        assert!(sem.is_held());

        let kv = store.read(ReadRequest::new(key.as_str())).await.unwrap().kv.unwrap();
        let state = SemaphoreState::decode(&key, &kv.value).unwrap();
        assert_eq!(state.holders.len(), 1);
        assert!(!state.holders.contains(&SessionId::new("s-ghost")));

        sem.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn holder_beyond_first_scan_page_is_not_pruned() {
        let store = DeterministicKeyValueStore::new();
        let key = state_key("svc/sem");

        let mut seeded = SemaphoreState::new(2);
        seeded.holders.insert(SessionId::new("zz-live"));
        store
            .write(WriteRequest::set(key.as_str(), &seeded.encode().unwrap()))
            .await
            .unwrap();

        // The live holder's contender entry sorts after a full scan page of
        // other contenders.
        store.write(WriteRequest::set("svc/sem/zz-live", "")).await.unwrap();
        for i in 0..alder_core::constants::MAX_SCAN_RESULTS {
            store
                .write(WriteRequest::set(format!("svc/sem/c-{i:04}"), ""))
                .await
                .unwrap();
        }

        let sem = DistributedSemaphore::new(store.clone(), options("svc/sem", 2)).unwrap();
        let cancel = CancellationToken::new();
        sem.acquire(&cancel).await.unwrap();

        let kv = store.read(ReadRequest::new(key.as_str())).await.unwrap().kv.unwrap();
        let state = SemaphoreState::decode(&key, &kv.value).unwrap();
        assert_eq!(state.holders.len(), 2);
        assert!(state.holders.contains(&SessionId::new("zz-live")));
    }

    #[tokio::test]
    async fn settle_window_defers_reclaim_of_pruned_slot() {
        let store = DeterministicKeyValueStore::new();
        let key = state_key("svc/sem");

        let mut ghost_state = SemaphoreState::new(1);
        ghost_state.holders.insert(SessionId::new("s-ghost"));
        store
            .write(WriteRequest::set(key.as_str(), &ghost_state.encode().unwrap()))
            .await
            .unwrap();

        let mut opts = options("svc/sem", 1);
        opts.lock_delay = Duration::from_millis(300);
        let sem = DistributedSemaphore::new(store.clone(), opts).unwrap();
        let cancel = CancellationToken::new();

        let start = Instant::now();
        sem.acquire(&cancel).await.unwrap();
        assert!(
            start.elapsed() >= Duration::from_millis(300),
            "acquired before the settle window closed: {:?}",
            start.elapsed()
        );

        sem.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_acquire_leaves_no_contender_entry() {
        let store = DeterministicKeyValueStore::new();
        let cancel = CancellationToken::new();

        let holder = DistributedSemaphore::new(store.clone(), options("svc/sem", 1)).unwrap();
        holder.acquire(&cancel).await.unwrap();

        let blocked = Arc::new(DistributedSemaphore::new(store.clone(), options("svc/sem", 1)).unwrap());
        let blocked_cancel = CancellationToken::new();
        let task = {
            let blocked = Arc::clone(&blocked);
            let token = blocked_cancel.clone();
            tokio::spawn(async move { blocked.acquire(&token).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        blocked_cancel.cancel();
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, SemaphoreError::Cancelled));
        assert!(!blocked.is_held());

        // Only the holder's contender entry and the sentinel remain.
        let scan = store.scan(ScanRequest::new("svc/sem/")).await.unwrap();
        let contenders: Vec<_> = scan
            .entries
            .iter()
            .filter_map(|e| contender_session("svc/sem", &e.key))
            .collect();
        assert_eq!(contenders.len(), 1);

        holder.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn lost_session_clears_held_status() {
        let store = DeterministicKeyValueStore::new();
        let sem = DistributedSemaphore::new(store.clone(), options("svc/sem", 1)).unwrap();
        let cancel = CancellationToken::new();

        sem.acquire(&cancel).await.unwrap();
        assert!(sem.is_held());

        let session_id = {
            let scan = store.scan(ScanRequest::new("svc/sem/")).await.unwrap();
            scan.entries
                .iter()
                .filter_map(|e| contender_session("svc/sem", &e.key))
                .next()
                .unwrap()
        };
        store.expire_session(&session_id).await;

        // Renewal runs at ttl/2 = 500ms and notices the loss.
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(!sem.is_held());

        // The handle can contend again with a fresh session.
        sem.acquire(&cancel).await.unwrap();
        assert!(sem.is_held());
        sem.destroy().await.unwrap();
    }
}
