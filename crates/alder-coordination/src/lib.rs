//! Distributed counting semaphore built on CAS operations.
//!
//! Limits concurrency across processes through a shared record in a
//! strongly-consistent key-value store, mutated only via compare-and-swap on
//! its modify revision. Ephemeral sessions give crash safety: a holder that
//! dies without releasing loses its session, its contender entry disappears,
//! and the other contenders prune it from the record.
//!
//! ## Example
//!
//! ```ignore
//! use alder_coordination::{DistributedSemaphore, SemaphoreOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let sem = DistributedSemaphore::new(store, SemaphoreOptions::new("service/worker-slots", 3))?;
//!
//! let cancel = CancellationToken::new();
//! sem.acquire(&cancel).await?;
//!
//! // At most 3 holders across all processes run this section.
//!
//! sem.release().await?;
//! ```

mod error;
mod lock_delay;
mod options;
mod semaphore;
mod session;
mod types;
mod watch;

pub use error::SemaphoreError;
pub use options::DEFAULT_MONITOR_RETRIES;
pub use options::DEFAULT_MONITOR_RETRY_DELAY;
pub use options::DEFAULT_WAIT_TIME;
pub use options::SemaphoreOptions;
pub use semaphore::DistributedSemaphore;
pub use session::SessionHandle;
pub use session::SessionManager;
pub use types::STATE_KEY_SUFFIX;
pub use types::SemaphoreState;
pub use types::contender_key;
pub use types::contender_session;
pub use types::state_key;
pub use watch::WatchCursor;
