//! Session lifecycle management.
//!
//! A [`SessionHandle`] owns one store session plus the background task that
//! renews it at half the TTL cadence. Renewal failures beyond the monitor
//! budget (or a store-side "session not found") flip the shared validity
//! flag; the owning semaphore handle observes the flip as loss of any held
//! slot.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use alder_core::KeyValueStore;
use alder_core::KeyValueStoreError;
use alder_core::SessionBehavior;
use alder_core::SessionId;
use alder_core::SessionRequest;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::error::SemaphoreError;
use crate::options::SemaphoreOptions;

/// Creates sessions and their renewal tasks.
pub struct SessionManager<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
}

impl<S: KeyValueStore + ?Sized + 'static> SessionManager<S> {
    /// Create a new session manager.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create a session and start its renewal task.
    ///
    /// Transient store failures are retried up to `monitor_retries` times
    /// before surfacing as `StoreUnavailable`.
    pub async fn create(&self, options: &SemaphoreOptions) -> Result<SessionHandle<S>, SemaphoreError> {
        let request = SessionRequest {
            name: options.session_name.clone(),
            ttl: options.session_ttl,
            behavior: SessionBehavior::Release,
            lock_delay: options.lock_delay,
        };

        let mut attempt = 0u32;
        let grant = loop {
            match self.store.create_session(request.clone()).await {
                Ok(grant) => break grant,
                Err(KeyValueStoreError::Unavailable { reason }) if attempt < options.monitor_retries => {
                    attempt += 1;
                    warn!(attempt, %reason, "session create failed, retrying");
                    tokio::time::sleep(options.monitor_retry_delay).await;
                }
                Err(KeyValueStoreError::Unavailable { reason }) => {
                    return Err(SemaphoreError::StoreUnavailable {
                        attempts: attempt + 1,
                        reason,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        };

        debug!(session = %grant.id, ttl_ms = grant.ttl.as_millis() as u64, "session created");

        let valid = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(renewal_loop(
            Arc::clone(&self.store),
            grant.id.clone(),
            grant.ttl / 2,
            options.monitor_retries,
            Arc::clone(&valid),
            cancel.clone(),
        ));

        Ok(SessionHandle {
            store: Arc::clone(&self.store),
            id: grant.id,
            valid,
            cancel,
            task: Some(task),
        })
    }
}

/// Renew on a fixed cadence until cancelled or the session is lost.
async fn renewal_loop<S: KeyValueStore + ?Sized>(
    store: Arc<S>,
    id: SessionId,
    cadence: std::time::Duration,
    monitor_retries: u32,
    valid: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(cadence);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately.
    interval.tick().await;

    let mut consecutive_failures = 0u32;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(session = %id, "renewal task stopped");
                return;
            }
            _ = interval.tick() => {}
        }

        match store.renew_session(&id).await {
            Ok(_) => {
                consecutive_failures = 0;
                debug!(session = %id, "session renewed");
            }
            Err(KeyValueStoreError::SessionNotFound { .. }) => {
                warn!(session = %id, "session expired server-side");
                valid.store(false, Ordering::SeqCst);
                return;
            }
            Err(e) => {
                consecutive_failures += 1;
                warn!(session = %id, error = %e, consecutive_failures, "session renewal failed");
                if consecutive_failures > monitor_retries {
                    valid.store(false, Ordering::SeqCst);
                    return;
                }
            }
        }
    }
}

/// An owned session with its renewal task.
pub struct SessionHandle<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
    id: SessionId,
    valid: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<S: KeyValueStore + ?Sized> SessionHandle<S> {
    /// The store-issued session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// True while renewal is keeping the lease alive.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    /// Shared validity flag, for observers that cannot hold the handle.
    pub fn valid_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.valid)
    }

    /// Stop renewal and release the lease, cascading deletion of bound keys.
    pub async fn destroy(mut self) -> Result<(), KeyValueStoreError> {
        // Mark invalid first so a renewal racing this destroy cannot report
        // the session alive after the lease is gone.
        self.valid.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.store.destroy_session(&self.id).await
    }
}

impl<S: KeyValueStore + ?Sized> Drop for SessionHandle<S> {
    fn drop(&mut self) {
        // Stop the renewal task; the lease itself is left to expire via TTL
        // when destroy() was not called.
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alder_core::test_support::DeterministicKeyValueStore;

    use super::*;

    fn options() -> SemaphoreOptions {
        let mut opts = SemaphoreOptions::new("svc/sem", 2);
        opts.session_ttl = Duration::from_secs(1);
        opts.lock_delay = Duration::ZERO;
        opts
    }

    #[tokio::test]
    async fn create_and_destroy_session() {
        let store = DeterministicKeyValueStore::new();
        let manager = SessionManager::new(store.clone());

        let handle = manager.create(&options()).await.unwrap();
        assert!(handle.is_valid());
        assert!(store.has_session(handle.id()).await);

        let id = handle.id().clone();
        handle.destroy().await.unwrap();
        assert!(!store.has_session(&id).await);
    }

    #[tokio::test]
    async fn renewal_keeps_session_valid() {
        let store = DeterministicKeyValueStore::new();
        let manager = SessionManager::new(store.clone());

        let handle = manager.create(&options()).await.unwrap();
        // Several renewal cadences pass; the session stays valid.
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert!(handle.is_valid());

        handle.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn expired_session_flips_validity() {
        let store = DeterministicKeyValueStore::new();
        let manager = SessionManager::new(store.clone());

        let handle = manager.create(&options()).await.unwrap();
        store.expire_session(handle.id()).await;

        // The next renewal (ttl/2 = 500ms) observes the loss.
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(!handle.is_valid());
    }
}
