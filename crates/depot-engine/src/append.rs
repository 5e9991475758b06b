use std::io::Read;

use depot_sync::{guard, SynchronizationStore};
use depot_types::Blob;

use crate::combined::BlobStore;
use crate::error::EngineResult;

/// Appends to a blob while holding that blob's lock.
///
/// The engine itself does not serialize appends; callers that may race on
/// one blob go through this helper (or take the lock themselves).
pub struct LockedAppender<B, S> {
    store: B,
    locks: S,
}

impl<B: BlobStore, S: SynchronizationStore> LockedAppender<B, S> {
    pub fn new(store: B, locks: S) -> Self {
        Self { store, locks }
    }

    pub fn store(&self) -> &B {
        &self.store
    }

    pub fn locks(&self) -> &S {
        &self.locks
    }

    /// Lock, append, finalize, unlock. The lock is released even when the
    /// append fails.
    pub fn append(&self, blob: &Blob, reader: &mut dyn Read, declared_len: Option<u64>) -> EngineResult<(Blob, u64)> {
        let _held = guard(&self.locks, blob.id)?;
        self.store.append(blob, reader, declared_len)
    }
}
