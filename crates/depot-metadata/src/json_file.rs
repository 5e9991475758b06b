//! Metadata persisted as a single JSON document.
//!
//! Every mutation rewrites the whole snapshot into a temporary file next to
//! the target and renames it into place, so the file on disk is always a
//! complete snapshot. A mutation whose snapshot cannot be written is rolled
//! back in memory as well.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use depot_types::{Blob, BlobId};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{MetadataError, MetadataResult};
use crate::memory::{InMemoryMetadataStore, MetadataSnapshot};
use crate::traits::MetadataStore;

/// A [`MetadataStore`] that survives restarts.
#[derive(Debug)]
pub struct JsonFileMetadataStore {
    path: PathBuf,
    records: InMemoryMetadataStore,
    // Serializes mutate-then-persist so snapshots land in mutation order.
    persist: Mutex<()>,
}

impl JsonFileMetadataStore {
    /// Open the store at `path`, loading it if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> MetadataResult<Self> {
        let path = path.into();
        let records = match fs::read(&path) {
            Ok(bytes) => {
                let snapshot: MetadataSnapshot = serde_json::from_slice(&bytes)?;
                info!(path = %path.display(), blobs = snapshot.blobs.len(), "metadata loaded");
                InMemoryMetadataStore::from_snapshot(snapshot)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => InMemoryMetadataStore::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            records,
            persist: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate<T>(&self, op: impl FnOnce(&InMemoryMetadataStore) -> MetadataResult<T>) -> MetadataResult<T> {
        let _guard = self.persist.lock().map_err(|_| MetadataError::LockPoisoned)?;
        let before = self.records.snapshot()?;
        let value = op(&self.records)?;
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), error = %e, "metadata snapshot not written, rolling back");
            self.records.restore(before)?;
            return Err(e);
        }
        Ok(value)
    }

    fn flush(&self) -> MetadataResult<()> {
        let snapshot = self.records.snapshot()?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut staged = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut staged, &snapshot)?;
        staged.flush()?;
        staged.as_file().sync_data()?;
        staged
            .persist(&self.path)
            .map_err(|e| MetadataError::Io(e.error))?;

        debug!(path = %self.path.display(), blobs = snapshot.blobs.len(), "metadata snapshot written");
        Ok(())
    }
}

impl MetadataStore for JsonFileMetadataStore {
    fn store_blob_record(&self, blob: &Blob) -> MetadataResult<Blob> {
        self.mutate(|records| records.store_blob_record(blob))
    }

    fn finalize_blob_record(&self, blob: &Blob) -> MetadataResult<Blob> {
        self.mutate(|records| records.finalize_blob_record(blob))
    }

    fn retrieve_blob_by_id(&self, id: BlobId) -> MetadataResult<Blob> {
        self.records.retrieve_blob_by_id(id)
    }

    fn delete_blob_by_id(&self, id: BlobId) -> MetadataResult<Blob> {
        self.mutate(|records| records.delete_blob_by_id(id))
    }

    fn blob_ids_matching_checksum(&self, checksum: &str) -> MetadataResult<Vec<BlobId>> {
        self.records.blob_ids_matching_checksum(checksum)
    }

    fn blob_ids_matching_name(&self, name: &str) -> MetadataResult<Vec<BlobId>> {
        self.records.blob_ids_matching_name(name)
    }

    fn blob_ids_matching_bucket(&self, bucket: &str) -> MetadataResult<Vec<BlobId>> {
        self.records.blob_ids_matching_bucket(bucket)
    }

    fn all_buckets(&self) -> MetadataResult<Vec<String>> {
        self.records.all_buckets()
    }

    fn all_blobs(&self) -> MetadataResult<Vec<Blob>> {
        self.records.all_blobs()
    }

    fn estimate_size_of_managed_content(&self) -> MetadataResult<i64> {
        self.records.estimate_size_of_managed_content()
    }
}
