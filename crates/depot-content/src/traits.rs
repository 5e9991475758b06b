use std::io::{Read, Write};
use std::sync::Arc;

use depot_types::Blob;

use crate::error::{ContentError, ContentResult};

/// Outcome of a mutating content operation.
///
/// Sizes are always derived from the bytes the store actually moved, never
/// from lengths declared by the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentWrite {
    /// Copy of the target blob with `size` set to the total content size
    /// after the operation.
    pub blob: Blob,
    /// Bytes transferred from the reader by this call.
    pub written: u64,
    /// Content size before the call, as observed by the store.
    pub previous_size: u64,
}

impl ContentWrite {
    pub fn new(blob: &Blob, written: u64, previous_size: u64, size: u64) -> Self {
        let mut blob = blob.clone();
        blob.size = size;
        Self {
            blob,
            written,
            previous_size,
        }
    }

    /// Change in stored bytes caused by the operation.
    pub fn delta(&self) -> i64 {
        self.blob.size as i64 - self.previous_size as i64
    }
}

/// Byte-level storage for blob content.
///
/// All implementations must satisfy these invariants:
/// - Content is addressed by the blob's allocated id; a pending id fails
///   with [`ContentError::InvalidBlobId`].
/// - Sizes reported by mutations come from bytes actually transferred.
/// - Errors are propagated unchanged, never swallowed or retried.
///
/// Decorators (caching, accounting) implement this same trait and wrap
/// another implementation, so they compose freely.
pub trait ContentStore: Send + Sync {
    /// Existence probe that transfers no content.
    fn contains_blob(&self, blob: &Blob) -> ContentResult<bool>;

    /// Replace the blob's content entirely with everything `reader` yields.
    fn write(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite>;

    /// Append to the blob's content, creating it if absent.
    fn append(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite>;

    /// Write at an absolute byte offset. A gap between the current end of
    /// content and `offset` is zero-filled.
    fn insert(&self, blob: &Blob, offset: u64, reader: &mut dyn Read) -> ContentResult<ContentWrite>;

    /// Remove the blob's content and return the number of bytes released.
    ///
    /// Fails with [`ContentError::NotFound`] if there is no content; the
    /// blob's metadata is never touched.
    fn delete(&self, blob: &Blob) -> ContentResult<u64>;

    /// Stream the full content into `writer`, returning the bytes copied.
    fn retrieve(&self, blob: &Blob, writer: &mut dyn Write) -> ContentResult<u64>;

    /// A location the caller can be redirected to instead of proxying bytes.
    ///
    /// Stores without an addressable location keep the default, which
    /// reports [`ContentError::MethodNotSupported`].
    fn url_for(&self, _blob: &Blob) -> ContentResult<String> {
        Err(ContentError::MethodNotSupported("url_for"))
    }

    /// Estimate the total bytes this store manages.
    fn estimate_size_of_managed_content(&self) -> ContentResult<i64> {
        Err(ContentError::MethodNotSupported("estimate_size_of_managed_content"))
    }
}

macro_rules! forward_content_store {
    ($wrapper:ty) => {
        impl<T: ContentStore + ?Sized> ContentStore for $wrapper {
            fn contains_blob(&self, blob: &Blob) -> ContentResult<bool> {
                (**self).contains_blob(blob)
            }

            fn write(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
                (**self).write(blob, reader)
            }

            fn append(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
                (**self).append(blob, reader)
            }

            fn insert(
                &self,
                blob: &Blob,
                offset: u64,
                reader: &mut dyn Read,
            ) -> ContentResult<ContentWrite> {
                (**self).insert(blob, offset, reader)
            }

            fn delete(&self, blob: &Blob) -> ContentResult<u64> {
                (**self).delete(blob)
            }

            fn retrieve(&self, blob: &Blob, writer: &mut dyn Write) -> ContentResult<u64> {
                (**self).retrieve(blob, writer)
            }

            fn url_for(&self, blob: &Blob) -> ContentResult<String> {
                (**self).url_for(blob)
            }

            fn estimate_size_of_managed_content(&self) -> ContentResult<i64> {
                (**self).estimate_size_of_managed_content()
            }
        }
    };
}

forward_content_store!(Arc<T>);
forward_content_store!(Box<T>);
