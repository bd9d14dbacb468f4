//! Core store abstractions for Alder coordination primitives.
//!
//! Defines the [`KeyValueStore`] trait for revision-stamped reads, CAS
//! writes, prefix scans, blocking reads, and ephemeral sessions, together
//! with its operation types, error taxonomy, and a deterministic in-memory
//! implementation for tests. Coordination primitives consume this seam only;
//! the transport and consensus machinery behind a production store live
//! elsewhere.

pub mod constants;
pub mod duration;
mod error;
mod kv;
mod session;
pub mod test_support;
mod traits;

pub use duration::DurationParseError;
pub use duration::format_go_duration;
pub use duration::go_duration;
pub use duration::parse_go_duration;
pub use error::KeyValueStoreError;
pub use kv::BlockingReadRequest;
pub use kv::BlockingReadResult;
pub use kv::DeleteRequest;
pub use kv::DeleteResult;
pub use kv::KeyValueWithRevision;
pub use kv::ReadRequest;
pub use kv::ReadResult;
pub use kv::ScanRequest;
pub use kv::ScanResult;
pub use kv::WriteCommand;
pub use kv::WriteRequest;
pub use kv::WriteResult;
pub use kv::validate_write_command;
pub use session::SessionBehavior;
pub use session::SessionGrant;
pub use session::SessionId;
pub use session::SessionRequest;
pub use session::validate_session_ttl;
pub use traits::KeyValueStore;
