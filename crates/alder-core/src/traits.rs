//! The store seam consumed by coordination primitives.

use async_trait::async_trait;

use crate::error::KeyValueStoreError;
use crate::kv::BlockingReadRequest;
use crate::kv::BlockingReadResult;
use crate::kv::DeleteRequest;
use crate::kv::DeleteResult;
use crate::kv::ReadRequest;
use crate::kv::ReadResult;
use crate::kv::ScanRequest;
use crate::kv::ScanResult;
use crate::kv::WriteRequest;
use crate::kv::WriteResult;
use crate::session::SessionGrant;
use crate::session::SessionId;
use crate::session::SessionRequest;

/// Strongly-consistent key-value store with revision-stamped CAS, ephemeral
/// sessions, and blocking reads.
///
/// Coordination correctness rests entirely on the implementation's atomic
/// CAS and session-expiry guarantees; implementations are expected to be
/// linearizable. Binding this trait to a concrete wire protocol is the
/// implementor's concern.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value by key with revision metadata.
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError>;

    /// Apply a write command.
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError>;

    /// Delete a key from the store.
    async fn delete(&self, request: DeleteRequest) -> Result<DeleteResult, KeyValueStoreError>;

    /// Scan keys matching a prefix.
    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError>;

    /// Long-poll a key: return when its modify revision exceeds
    /// `since_revision`, or after `max_wait` with an unchanged revision.
    async fn block_read(&self, request: BlockingReadRequest) -> Result<BlockingReadResult, KeyValueStoreError>;

    /// Create a new session, returning the store-issued id.
    async fn create_session(&self, request: SessionRequest) -> Result<SessionGrant, KeyValueStoreError>;

    /// Reset the session's expiry clock.
    async fn renew_session(&self, session_id: &SessionId) -> Result<SessionGrant, KeyValueStoreError>;

    /// Release the lease immediately, deleting all bound keys.
    async fn destroy_session(&self, session_id: &SessionId) -> Result<(), KeyValueStoreError>;
}

// Blanket implementation for Arc<T>
#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        (**self).read(request).await
    }

    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        (**self).write(request).await
    }

    async fn delete(&self, request: DeleteRequest) -> Result<DeleteResult, KeyValueStoreError> {
        (**self).delete(request).await
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError> {
        (**self).scan(request).await
    }

    async fn block_read(&self, request: BlockingReadRequest) -> Result<BlockingReadResult, KeyValueStoreError> {
        (**self).block_read(request).await
    }

    async fn create_session(&self, request: SessionRequest) -> Result<SessionGrant, KeyValueStoreError> {
        (**self).create_session(request).await
    }

    async fn renew_session(&self, session_id: &SessionId) -> Result<SessionGrant, KeyValueStoreError> {
        (**self).renew_session(session_id).await
    }

    async fn destroy_session(&self, session_id: &SessionId) -> Result<(), KeyValueStoreError> {
        (**self).destroy_session(session_id).await
    }
}
