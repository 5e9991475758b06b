//! Error types for metadata operations.

use depot_types::{BlobId, TypeError};
use thiserror::Error;

/// Errors that can occur during metadata operations.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// No record satisfies the lookup.
    #[error("no matching blobs")]
    NoMatchingBlobs,

    /// A record lacks fields required for finalization.
    #[error("blob {id} is incomplete, missing: {}", missing.join(", "))]
    IncompleteRecord { id: BlobId, missing: Vec<&'static str> },

    /// The record's descriptive fields are invalid.
    #[error("invalid blob record: {0}")]
    InvalidRecord(#[from] TypeError),

    /// A search was issued without any criterion.
    #[error("invalid query: at least one of name, bucket or checksum is required")]
    InvalidQuery,

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during file-based metadata operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata lock poisoned")]
    LockPoisoned,
}

/// Convenience type alias for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
