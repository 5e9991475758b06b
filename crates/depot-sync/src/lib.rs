//! Per-blob locking for Depot.
//!
//! Appends to one blob are only correct when callers serialize them. This
//! crate provides the lock table they serialize on; the storage engine itself
//! never takes these locks.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{SyncError, SyncResult};
pub use memory::{MemorySynchronizationStore, DEFAULT_IDLE_THRESHOLD};
pub use traits::{guard, SyncGuard, SynchronizationStore};
