use std::io::{Read, Write};
use std::sync::atomic::{AtomicI64, Ordering};

use depot_types::Blob;
use tracing::{debug, warn};

use crate::error::{ContentError, ContentResult};
use crate::traits::{ContentStore, ContentWrite};

/// Decorator keeping a running total of the bytes under management.
///
/// The total is seeded once from the wrapped store's own estimate and then
/// adjusted by every successful mutation, so `estimate()` never touches the
/// backend.
pub struct AccountingContentStore<C> {
    inner: C,
    total: AtomicI64,
}

impl<C: ContentStore> AccountingContentStore<C> {
    /// Wrap `inner`, seeding the total from its estimate.
    ///
    /// If the estimate fails the store still works, starting from zero, and
    /// the error is handed back for the caller to report.
    pub fn new(inner: C) -> (Self, Option<ContentError>) {
        let (seed, error) = match inner.estimate_size_of_managed_content() {
            Ok(size) => (size, None),
            Err(e) => {
                warn!(error = %e, "content size estimate failed, accounting from zero");
                (0, Some(e))
            }
        };
        debug!(seed, "accounting initialized");
        let store = Self {
            inner,
            total: AtomicI64::new(seed),
        };
        (store, error)
    }

    /// Current running total in bytes.
    pub fn estimate(&self) -> i64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn record(&self, outcome: ContentResult<ContentWrite>) -> ContentResult<ContentWrite> {
        match outcome {
            Ok(outcome) => {
                self.total.fetch_add(outcome.delta(), Ordering::SeqCst);
                Ok(outcome)
            }
            Err(e) => {
                self.resync();
                Err(e)
            }
        }
    }

    // A failed mutation may still have left part of its bytes behind.
    fn resync(&self) {
        match self.inner.estimate_size_of_managed_content() {
            Ok(size) => {
                let before = self.total.swap(size, Ordering::SeqCst);
                if before != size {
                    debug!(before, after = size, "accounting resynchronized after failed mutation");
                }
            }
            Err(e) => warn!(error = %e, "accounting not resynchronized after failed mutation"),
        }
    }
}

impl<C: ContentStore> ContentStore for AccountingContentStore<C> {
    fn contains_blob(&self, blob: &Blob) -> ContentResult<bool> {
        self.inner.contains_blob(blob)
    }

    fn write(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        self.record(self.inner.write(blob, reader))
    }

    fn append(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        self.record(self.inner.append(blob, reader))
    }

    fn insert(&self, blob: &Blob, offset: u64, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        self.record(self.inner.insert(blob, offset, reader))
    }

    fn delete(&self, blob: &Blob) -> ContentResult<u64> {
        let released = self.inner.delete(blob)?;
        self.total.fetch_sub(released as i64, Ordering::SeqCst);
        Ok(released)
    }

    fn retrieve(&self, blob: &Blob, writer: &mut dyn Write) -> ContentResult<u64> {
        self.inner.retrieve(blob, writer)
    }

    fn url_for(&self, blob: &Blob) -> ContentResult<String> {
        self.inner.url_for(blob)
    }

    fn estimate_size_of_managed_content(&self) -> ContentResult<i64> {
        Ok(self.estimate())
    }
}
