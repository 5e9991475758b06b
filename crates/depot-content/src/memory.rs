use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use depot_types::{Blob, BlobId};

use crate::error::{ContentError, ContentResult};
use crate::traits::{ContentStore, ContentWrite};

/// In-memory, HashMap-based content store.
///
/// Intended for tests and embedding. Content lives behind a `RwLock`; the
/// store also counts reads and mutations that reach it, which lets
/// decorator tests observe whether a call reached the backend.
#[derive(Default)]
pub struct InMemoryContentStore {
    content: RwLock<HashMap<BlobId, Vec<u8>>>,
    retrievals: AtomicU64,
    mutations: AtomicU64,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs with content.
    pub fn len(&self) -> usize {
        self.content.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many `retrieve` calls have streamed content out of this store.
    pub fn retrieve_count(&self) -> u64 {
        self.retrievals.load(Ordering::Relaxed)
    }

    /// How many write, append and insert calls have succeeded.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::Relaxed)
    }

    fn check_id(blob: &Blob) -> ContentResult<BlobId> {
        if blob.id.is_allocated() {
            Ok(blob.id)
        } else {
            Err(ContentError::InvalidBlobId(blob.id))
        }
    }

    fn drain(reader: &mut dyn Read) -> ContentResult<Vec<u8>> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl ContentStore for InMemoryContentStore {
    fn contains_blob(&self, blob: &Blob) -> ContentResult<bool> {
        let map = self.content.read().map_err(|_| ContentError::LockPoisoned)?;
        Ok(map.contains_key(&blob.id))
    }

    fn write(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        let id = Self::check_id(blob)?;
        let data = Self::drain(reader)?;
        let written = data.len() as u64;

        let mut map = self.content.write().map_err(|_| ContentError::LockPoisoned)?;
        let previous_size = map.insert(id, data).map_or(0, |old| old.len() as u64);
        self.mutations.fetch_add(1, Ordering::Relaxed);
        Ok(ContentWrite::new(blob, written, previous_size, written))
    }

    fn append(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        let id = Self::check_id(blob)?;
        let data = Self::drain(reader)?;
        let written = data.len() as u64;

        let mut map = self.content.write().map_err(|_| ContentError::LockPoisoned)?;
        let entry = map.entry(id).or_default();
        let previous_size = entry.len() as u64;
        entry.extend_from_slice(&data);
        self.mutations.fetch_add(1, Ordering::Relaxed);
        Ok(ContentWrite::new(blob, written, previous_size, entry.len() as u64))
    }

    fn insert(&self, blob: &Blob, offset: u64, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        let id = Self::check_id(blob)?;
        let start = usize::try_from(offset).map_err(|_| ContentError::InvalidOffset(offset as i64))?;
        let data = Self::drain(reader)?;
        let written = data.len() as u64;

        let end = start
            .checked_add(data.len())
            .filter(|&end| end <= isize::MAX as usize)
            .ok_or(ContentError::InvalidOffset(offset as i64))?;

        let mut map = self.content.write().map_err(|_| ContentError::LockPoisoned)?;
        let entry = map.entry(id).or_default();
        let previous_size = entry.len() as u64;
        if entry.len() < end {
            entry
                .try_reserve(end - entry.len())
                .map_err(|_| ContentError::InvalidOffset(offset as i64))?;
            entry.resize(end, 0);
        }
        entry[start..end].copy_from_slice(&data);
        self.mutations.fetch_add(1, Ordering::Relaxed);
        Ok(ContentWrite::new(blob, written, previous_size, entry.len() as u64))
    }

    fn delete(&self, blob: &Blob) -> ContentResult<u64> {
        let mut map = self.content.write().map_err(|_| ContentError::LockPoisoned)?;
        map.remove(&blob.id)
            .map(|old| old.len() as u64)
            .ok_or(ContentError::NotFound(blob.id))
    }

    fn retrieve(&self, blob: &Blob, writer: &mut dyn Write) -> ContentResult<u64> {
        let map = self.content.read().map_err(|_| ContentError::LockPoisoned)?;
        let data = map.get(&blob.id).ok_or(ContentError::NotFound(blob.id))?;
        self.retrievals.fetch_add(1, Ordering::Relaxed);
        Ok(io::copy(&mut data.as_slice(), writer)?)
    }

    fn estimate_size_of_managed_content(&self) -> ContentResult<i64> {
        let map = self.content.read().map_err(|_| ContentError::LockPoisoned)?;
        Ok(map.values().map(|data| data.len() as i64).sum())
    }
}
