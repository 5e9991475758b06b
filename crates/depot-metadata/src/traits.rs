//! The [`MetadataStore`] trait defining the blob record interface.
//!
//! Any backend (in-memory, file, database) implements this trait to keep the
//! descriptive side of a blob: name, bucket, owner, checksum and size.

use std::collections::BTreeSet;
use std::sync::Arc;

use depot_types::{Blob, BlobId, BlobQuery};

use crate::error::{MetadataError, MetadataResult};

/// Storage backend for blob records.
///
/// Lookups that find nothing fail with [`MetadataError::NoMatchingBlobs`]
/// rather than returning an empty value, so callers can tell "absent" apart
/// from other failures with a single match.
pub trait MetadataStore: Send + Sync {
    /// Create or replace a record.
    ///
    /// A pending id is replaced with a freshly allocated one; the stored
    /// record is returned.
    fn store_blob_record(&self, blob: &Blob) -> MetadataResult<Blob>;

    /// Commit a complete record (checksum and size filled in).
    ///
    /// Fails with [`MetadataError::IncompleteRecord`] if any required field
    /// is missing and with [`MetadataError::NoMatchingBlobs`] if the id was
    /// never stored.
    fn finalize_blob_record(&self, blob: &Blob) -> MetadataResult<Blob>;

    fn retrieve_blob_by_id(&self, id: BlobId) -> MetadataResult<Blob>;

    /// Remove a record, returning it.
    fn delete_blob_by_id(&self, id: BlobId) -> MetadataResult<Blob>;

    fn blob_ids_matching_checksum(&self, checksum: &str) -> MetadataResult<Vec<BlobId>>;

    fn blob_ids_matching_name(&self, name: &str) -> MetadataResult<Vec<BlobId>>;

    fn blob_ids_matching_bucket(&self, bucket: &str) -> MetadataResult<Vec<BlobId>>;

    /// Distinct bucket names, sorted.
    fn all_buckets(&self) -> MetadataResult<Vec<String>>;

    /// Every record, ordered by id.
    fn all_blobs(&self) -> MetadataResult<Vec<Blob>>;

    /// Sum of recorded sizes.
    fn estimate_size_of_managed_content(&self) -> MetadataResult<i64>;

    /// Ids matching any criterion of `query`, sorted and deduplicated.
    fn search(&self, query: &BlobQuery) -> MetadataResult<Vec<BlobId>> {
        if query.is_empty() {
            return Err(MetadataError::InvalidQuery);
        }

        let mut found = BTreeSet::new();
        let selections = [
            query.name.as_deref().map(|name| self.blob_ids_matching_name(name)),
            query.bucket.as_deref().map(|bucket| self.blob_ids_matching_bucket(bucket)),
            query.checksum.as_deref().map(|sum| self.blob_ids_matching_checksum(sum)),
        ];
        for selection in selections.into_iter().flatten() {
            match selection {
                Ok(ids) => found.extend(ids),
                Err(MetadataError::NoMatchingBlobs) => {}
                Err(e) => return Err(e),
            }
        }

        if found.is_empty() {
            return Err(MetadataError::NoMatchingBlobs);
        }
        Ok(found.into_iter().collect())
    }
}

impl<T: MetadataStore + ?Sized> MetadataStore for Arc<T> {
    fn store_blob_record(&self, blob: &Blob) -> MetadataResult<Blob> {
        (**self).store_blob_record(blob)
    }

    fn finalize_blob_record(&self, blob: &Blob) -> MetadataResult<Blob> {
        (**self).finalize_blob_record(blob)
    }

    fn retrieve_blob_by_id(&self, id: BlobId) -> MetadataResult<Blob> {
        (**self).retrieve_blob_by_id(id)
    }

    fn delete_blob_by_id(&self, id: BlobId) -> MetadataResult<Blob> {
        (**self).delete_blob_by_id(id)
    }

    fn blob_ids_matching_checksum(&self, checksum: &str) -> MetadataResult<Vec<BlobId>> {
        (**self).blob_ids_matching_checksum(checksum)
    }

    fn blob_ids_matching_name(&self, name: &str) -> MetadataResult<Vec<BlobId>> {
        (**self).blob_ids_matching_name(name)
    }

    fn blob_ids_matching_bucket(&self, bucket: &str) -> MetadataResult<Vec<BlobId>> {
        (**self).blob_ids_matching_bucket(bucket)
    }

    fn all_buckets(&self) -> MetadataResult<Vec<String>> {
        (**self).all_buckets()
    }

    fn all_blobs(&self) -> MetadataResult<Vec<Blob>> {
        (**self).all_blobs()
    }

    fn estimate_size_of_managed_content(&self) -> MetadataResult<i64> {
        (**self).estimate_size_of_managed_content()
    }

    fn search(&self, query: &BlobQuery) -> MetadataResult<Vec<BlobId>> {
        (**self).search(query)
    }
}
