//! Blocking-read cursor over a single key.

use std::sync::Arc;
use std::time::Duration;

use alder_core::BlockingReadRequest;
use alder_core::KeyValueStore;
use tokio_util::sync::CancellationToken;

use crate::error::SemaphoreError;

/// Long-poll cursor with monotone revision tracking.
///
/// Replaces polling: one in-flight blocking read per iteration, waking when
/// the watched key changes or the wait window lapses. A timeout and a real
/// change are handled identically by the caller: re-evaluate state.
pub struct WatchCursor<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
    key: String,
    since: u64,
}

impl<S: KeyValueStore + ?Sized> WatchCursor<S> {
    /// Cursor starting from revision zero.
    pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            since: 0,
        }
    }

    /// Ratchet the cursor forward; never moves backwards.
    pub fn observe(&mut self, revision: u64) {
        self.since = self.since.max(revision);
    }

    /// Current cursor revision.
    pub fn revision(&self) -> u64 {
        self.since
    }

    /// Wait until the key changes past the cursor or `max_wait` elapses.
    ///
    /// Returns whether a change was observed. Cancellation aborts the
    /// in-flight blocking read promptly.
    pub async fn wait(&mut self, max_wait: Duration, cancel: &CancellationToken) -> Result<bool, SemaphoreError> {
        let request = BlockingReadRequest {
            key: self.key.clone(),
            since_revision: self.since,
            max_wait,
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(SemaphoreError::Cancelled),
            result = self.store.block_read(request) => result?,
        };

        let changed = result.revision > self.since;
        self.observe(result.revision);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use alder_core::WriteRequest;
    use alder_core::test_support::DeterministicKeyValueStore;

    use super::*;

    #[tokio::test]
    async fn wait_reports_change_and_ratchets() {
        let store = DeterministicKeyValueStore::new();
        let first = store.write(WriteRequest::set("k", "v1")).await.unwrap();

        let mut cursor = WatchCursor::new(store.clone(), "k");
        cursor.observe(first.mod_revision);

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                store.write(WriteRequest::set("k", "v2")).await.unwrap()
            })
        };

        let cancel = CancellationToken::new();
        let changed = cursor.wait(Duration::from_secs(5), &cancel).await.unwrap();
        let second = writer.await.unwrap();

        assert!(changed);
        assert_eq!(cursor.revision(), second.mod_revision);
    }

    #[tokio::test]
    async fn wait_times_out_without_change() {
        let store = DeterministicKeyValueStore::new();
        let first = store.write(WriteRequest::set("k", "v1")).await.unwrap();

        let mut cursor = WatchCursor::new(store.clone(), "k");
        cursor.observe(first.mod_revision);

        let cancel = CancellationToken::new();
        let changed = cursor.wait(Duration::from_millis(100), &cancel).await.unwrap();

        assert!(!changed);
        assert_eq!(cursor.revision(), first.mod_revision);
    }

    #[tokio::test]
    async fn cancellation_aborts_wait() {
        let store = DeterministicKeyValueStore::new();
        store.write(WriteRequest::set("k", "v1")).await.unwrap();

        let mut cursor = WatchCursor::new(store.clone(), "k");
        cursor.observe(1);

        let cancel = CancellationToken::new();
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            })
        };

        let err = cursor.wait(Duration::from_secs(30), &cancel).await.unwrap_err();
        assert!(matches!(err, SemaphoreError::Cancelled));
        canceller.await.unwrap();
    }
}
