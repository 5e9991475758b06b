use depot_content::ContentError;
use depot_metadata::MetadataError;
use depot_sync::SyncError;
use depot_types::BlobId;
use serde::Serialize;
use thiserror::Error;

/// Broad classification of engine failures, used by outer layers to pick a
/// response without matching every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Integrity,
    Unsupported,
    Configuration,
    Io,
    InvalidRequest,
    QuotaExceeded,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("content error: {0}")]
    Content(#[from] ContentError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("lock error: {0}")]
    Sync(#[from] SyncError),

    /// The caller announced a length that differs from what was received.
    #[error("blob {id}: declared {declared} bytes but received {written}")]
    SizeMismatch { id: BlobId, declared: u64, written: u64 },

    /// Re-reading the stored content yielded a different byte count.
    #[error("blob {id}: expected {expected} bytes on read-back, got {read}")]
    ReadBackMismatch { id: BlobId, expected: u64, read: u64 },

    #[error("invalid offset: {0}")]
    InvalidOffset(i64),

    #[error("quota of {quota} bytes exceeded: {requested} bytes would be managed")]
    QuotaExceeded { quota: u64, requested: i64 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Content(e) => match e {
                ContentError::NotFound(_) => ErrorKind::NotFound,
                ContentError::InvalidBlobId(_) | ContentError::InvalidOffset(_) => ErrorKind::InvalidRequest,
                ContentError::Config(_) | ContentError::Route(_) => ErrorKind::Configuration,
                ContentError::MethodNotSupported(_) => ErrorKind::Unsupported,
                ContentError::Io(_) | ContentError::LockPoisoned => ErrorKind::Io,
            },
            Self::Metadata(e) => match e {
                MetadataError::NoMatchingBlobs => ErrorKind::NotFound,
                MetadataError::IncompleteRecord { .. } => ErrorKind::Integrity,
                MetadataError::InvalidRecord(_) | MetadataError::InvalidQuery => ErrorKind::InvalidRequest,
                MetadataError::Serialization(_) | MetadataError::Io(_) | MetadataError::LockPoisoned => {
                    ErrorKind::Io
                }
            },
            Self::Sync(e) => match e {
                SyncError::InvalidBlobId(_) => ErrorKind::InvalidRequest,
                SyncError::Poisoned => ErrorKind::Io,
            },
            Self::SizeMismatch { .. } | Self::ReadBackMismatch { .. } => ErrorKind::Integrity,
            Self::InvalidOffset(_) => ErrorKind::InvalidRequest,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Shorthand for `kind() == ErrorKind::NotFound`.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let missing = EngineError::from(MetadataError::NoMatchingBlobs);
        assert!(missing.is_not_found());

        let unsupported = EngineError::from(ContentError::MethodNotSupported("url_for"));
        assert_eq!(unsupported.kind(), ErrorKind::Unsupported);

        let mismatch = EngineError::ReadBackMismatch {
            id: BlobId::new(1),
            expected: 4,
            read: 3,
        };
        assert_eq!(mismatch.kind(), ErrorKind::Integrity);
        assert_eq!(EngineError::InvalidOffset(-1).kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::QuotaExceeded).unwrap();
        assert_eq!(json, "\"quota_exceeded\"");
    }
}
