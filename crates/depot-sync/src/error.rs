use depot_types::BlobId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A thread panicked while holding internal lock state.
    #[error("lock table poisoned")]
    Poisoned,

    #[error("cannot lock unallocated blob id {0}")]
    InvalidBlobId(BlobId),
}

pub type SyncResult<T> = Result<T, SyncError>;
