use depot_types::{BlobId, TypeError};

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// No content exists for the blob.
    #[error("blob content missing: {0}")]
    NotFound(BlobId),

    /// The blob id cannot address content (pending or non-positive).
    #[error("blob metadata issue: id {0} cannot address content")]
    InvalidBlobId(BlobId),

    /// A positional write was requested at a negative offset.
    #[error("invalid content offset: {0}")]
    InvalidOffset(i64),

    /// The store was constructed against an unusable location or settings.
    #[error("bad store configuration: {0}")]
    Config(String),

    /// The store variant does not implement this operation.
    #[error("method not supported: {0}")]
    MethodNotSupported(&'static str),

    /// A named route could not be resolved to a URL.
    #[error("route error: {0}")]
    Route(#[from] TypeError),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal lock was poisoned by a panicking thread.
    #[error("content store lock poisoned")]
    LockPoisoned,
}

impl ContentError {
    /// Map an I/O error, turning `NotFound` into [`ContentError::NotFound`].
    pub(crate) fn from_io(err: std::io::Error, id: BlobId) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(id)
        } else {
            Self::Io(err)
        }
    }
}

/// Result alias for content store operations.
pub type ContentResult<T> = Result<T, ContentError>;
