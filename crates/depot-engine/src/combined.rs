use std::io::{self, Read, Write};
use std::sync::Arc;

use depot_content::{ContentError, ContentStore, ContentWrite};
use depot_crypto::ChecksumWriter;
use depot_metadata::{MetadataError, MetadataStore};
use depot_types::{Blob, BlobId};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

/// The operations the outside world performs on blobs.
///
/// Mutations return the finalized record together with the number of bytes
/// taken from the reader.
pub trait BlobStore: Send + Sync {
    fn write(&self, blob: &Blob, reader: &mut dyn Read, declared_len: Option<u64>) -> EngineResult<(Blob, u64)>;

    fn append(&self, blob: &Blob, reader: &mut dyn Read, declared_len: Option<u64>) -> EngineResult<(Blob, u64)>;

    fn insert(&self, blob: &Blob, offset: i64, reader: &mut dyn Read) -> EngineResult<(Blob, u64)>;

    /// Remove content and metadata, returning the deleted record.
    fn delete(&self, blob: &Blob) -> EngineResult<Blob>;

    fn retrieve(&self, blob: &Blob, writer: &mut dyn Write) -> EngineResult<u64>;

    fn url_for(&self, blob: &Blob) -> EngineResult<String>;

    fn contains_blob(&self, blob: &Blob) -> EngineResult<bool>;

    /// Look up the current record for `id`.
    fn describe(&self, id: BlobId) -> EngineResult<Blob>;
}

impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    fn write(&self, blob: &Blob, reader: &mut dyn Read, declared_len: Option<u64>) -> EngineResult<(Blob, u64)> {
        (**self).write(blob, reader, declared_len)
    }

    fn append(&self, blob: &Blob, reader: &mut dyn Read, declared_len: Option<u64>) -> EngineResult<(Blob, u64)> {
        (**self).append(blob, reader, declared_len)
    }

    fn insert(&self, blob: &Blob, offset: i64, reader: &mut dyn Read) -> EngineResult<(Blob, u64)> {
        (**self).insert(blob, offset, reader)
    }

    fn delete(&self, blob: &Blob) -> EngineResult<Blob> {
        (**self).delete(blob)
    }

    fn retrieve(&self, blob: &Blob, writer: &mut dyn Write) -> EngineResult<u64> {
        (**self).retrieve(blob, writer)
    }

    fn url_for(&self, blob: &Blob) -> EngineResult<String> {
        (**self).url_for(blob)
    }

    fn contains_blob(&self, blob: &Blob) -> EngineResult<bool> {
        (**self).contains_blob(blob)
    }

    fn describe(&self, id: BlobId) -> EngineResult<Blob> {
        (**self).describe(id)
    }
}

/// Metadata and content stores kept consistent as one unit.
///
/// Every mutation follows the same protocol: make sure a record exists,
/// move the bytes, re-read what was persisted to compute size and checksum,
/// then finalize the record. Metadata only ever describes bytes that were
/// actually read back from the content store.
pub struct CombinedStore<M, C> {
    metadata: M,
    content: C,
    quota: Option<u64>,
}

impl<M: MetadataStore, C: ContentStore> CombinedStore<M, C> {
    pub fn new(metadata: M, content: C) -> Self {
        Self {
            metadata,
            content,
            quota: None,
        }
    }

    /// Refuse mutations that would grow managed content beyond `quota` bytes.
    pub fn with_quota(mut self, quota: u64) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn quota(&self) -> Option<u64> {
        self.quota
    }

    /// Bytes under management according to the content store, falling back
    /// to the recorded sizes when the content store cannot estimate.
    pub fn estimate_size_of_managed_content(&self) -> EngineResult<i64> {
        match self.content.estimate_size_of_managed_content() {
            Ok(size) => Ok(size),
            Err(ContentError::MethodNotSupported(_)) => Ok(self.metadata.estimate_size_of_managed_content()?),
            Err(e) => Err(e.into()),
        }
    }

    /// Stream a blob's content by id, resolving its record first.
    pub fn retrieve_by_id(&self, id: BlobId, writer: &mut dyn Write) -> EngineResult<(Blob, u64)> {
        let blob = self.metadata.retrieve_blob_by_id(id)?;
        let read = self.content.retrieve(&blob, writer)?;
        Ok((blob, read))
    }

    /// Return the stored record for `blob`, storing a work-in-progress one
    /// if none exists yet.
    fn ensure_metadata(&self, blob: &Blob) -> EngineResult<Blob> {
        if blob.id.is_allocated() {
            match self.metadata.retrieve_blob_by_id(blob.id) {
                Ok(existing) => return Ok(existing),
                Err(MetadataError::NoMatchingBlobs) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let mut wip = blob.clone();
        wip.size = 0;
        wip.checksum.clear();
        let stored = self.metadata.store_blob_record(&wip)?;
        debug!(id = %stored.id, name = %stored.name, "work-in-progress record stored");
        Ok(stored)
    }

    /// How many bytes a mutation of `record` starting at `offset` may take
    /// before managed content would pass the quota.
    fn budget(&self, record: &Blob, offset: u64) -> EngineResult<Option<Budget>> {
        let Some(quota) = self.quota else {
            return Ok(None);
        };
        let current = self.estimate_size_of_managed_content()?;
        let allowed = i128::from(quota) - i128::from(current) + i128::from(record.size) - i128::from(offset);
        Ok(Some(Budget {
            quota,
            current,
            allowed: u64::try_from(allowed.max(0)).unwrap_or(u64::MAX),
        }))
    }

    /// Run one content mutation under the quota, then verify and finalize.
    ///
    /// A declared length over budget is refused before any byte is read.
    /// Without one the reader is cut off once the budget is spent.
    fn mutate(
        &self,
        record: Blob,
        offset: u64,
        declared_len: Option<u64>,
        reader: &mut dyn Read,
        op: impl FnOnce(&C, &Blob, &mut dyn Read) -> Result<ContentWrite, ContentError>,
    ) -> EngineResult<(Blob, u64)> {
        let budget = self.budget(&record, offset)?;
        if let (Some(budget), Some(declared)) = (&budget, declared_len) {
            if declared > budget.allowed {
                return Err(budget.exceeded(&record, offset, declared));
            }
        }

        let mut limited = QuotaReader::new(reader, budget.as_ref().map_or(u64::MAX, |b| b.allowed));
        let source: &mut dyn Read = &mut limited;
        let outcome = match op(&self.content, &record, source) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.reconcile(&record);
                return Err(match budget {
                    Some(budget) if limited.exceeded => {
                        budget.exceeded(&record, offset, budget.allowed.saturating_add(1))
                    }
                    _ => e.into(),
                });
            }
        };
        self.checksum_and_finalize(outcome, declared_len)
    }

    /// Re-read the persisted content, hash it, and commit the record.
    ///
    /// The record always ends up describing the bytes read back. When those
    /// disagree with what the content store reported it stays unfinalized;
    /// when only the caller's declared length was wrong it is finalized and
    /// the mismatch is still reported.
    fn checksum_and_finalize(&self, outcome: ContentWrite, declared_len: Option<u64>) -> EngineResult<(Blob, u64)> {
        let expected = outcome.blob.size;
        let mut blob = outcome.blob;
        let mut hasher = ChecksumWriter::new();
        let read = self.content.retrieve(&blob, &mut hasher)?;

        if read != expected || hasher.bytes_written() != expected {
            blob.size = hasher.bytes_written();
            blob.checksum.clear();
            self.metadata.store_blob_record(&blob)?;
            warn!(id = %blob.id, expected, read, "read-back mismatch, record left unfinalized");
            return Err(EngineError::ReadBackMismatch {
                id: blob.id,
                expected,
                read,
            });
        }

        blob.checksum = hasher.finalize();
        let finalized = self.metadata.finalize_blob_record(&blob)?;
        info!(id = %finalized.id, size = finalized.size, checksum = %finalized.checksum, "blob finalized");

        match declared_len {
            Some(declared) if declared != outcome.written => Err(EngineError::SizeMismatch {
                id: finalized.id,
                declared,
                written: outcome.written,
            }),
            _ => Ok((finalized, outcome.written)),
        }
    }

    /// After a failed content mutation, make the record describe whatever
    /// the content store now holds. A record that still matches is left
    /// alone; anything else is stored unfinalized with the observed size.
    fn reconcile(&self, record: &Blob) {
        let mut hasher = ChecksumWriter::new();
        let (size, checksum) = match self.content.retrieve(record, &mut hasher) {
            Ok(_) => (hasher.bytes_written(), Some(hasher.finalize())),
            Err(ContentError::NotFound(_)) => (0, None),
            Err(e) => {
                warn!(id = %record.id, error = %e, "content unreadable after failed mutation");
                return;
            }
        };

        let unchanged = size == record.size
            && (!record.is_finalized() || checksum.as_deref() == Some(record.checksum.as_str()));
        if unchanged {
            return;
        }

        let mut observed = record.clone();
        observed.size = size;
        observed.checksum.clear();
        match self.metadata.store_blob_record(&observed) {
            Ok(_) => warn!(id = %record.id, size, "failed mutation changed content, record left unfinalized"),
            Err(e) => warn!(id = %record.id, error = %e, "record not updated after failed mutation"),
        }
    }
}

/// Room left under the quota for one mutation.
struct Budget {
    quota: u64,
    current: i64,
    allowed: u64,
}

impl Budget {
    fn exceeded(&self, record: &Blob, offset: u64, takes: u64) -> EngineError {
        let grows = u128::from(offset.saturating_add(takes)).saturating_sub(u128::from(record.size));
        let requested = i64::try_from(i128::from(self.current) + grows as i128).unwrap_or(i64::MAX);
        warn!(id = %record.id, quota = self.quota, requested, "mutation refused, quota exceeded");
        EngineError::QuotaExceeded {
            quota: self.quota,
            requested,
        }
    }
}

/// Hands through at most `remaining` bytes, failing if the source has more.
struct QuotaReader<'a> {
    inner: &'a mut dyn Read,
    remaining: u64,
    exceeded: bool,
}

impl<'a> QuotaReader<'a> {
    fn new(inner: &'a mut dyn Read, remaining: u64) -> Self {
        Self {
            inner,
            remaining,
            exceeded: false,
        }
    }
}

impl Read for QuotaReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            let mut extra = [0u8; 1];
            if self.inner.read(&mut extra)? == 0 {
                return Ok(0);
            }
            self.exceeded = true;
            return Err(io::Error::other("quota exceeded"));
        }

        let limit = usize::try_from(self.remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let n = self.inner.read(&mut buf[..limit])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

impl<M: MetadataStore, C: ContentStore> BlobStore for CombinedStore<M, C> {
    fn write(&self, blob: &Blob, reader: &mut dyn Read, declared_len: Option<u64>) -> EngineResult<(Blob, u64)> {
        let record = self.ensure_metadata(blob)?;
        self.mutate(record, 0, declared_len, reader, |content, record, reader| {
            content.write(record, reader)
        })
    }

    fn append(&self, blob: &Blob, reader: &mut dyn Read, declared_len: Option<u64>) -> EngineResult<(Blob, u64)> {
        let record = self.ensure_metadata(blob)?;
        let offset = record.size;
        self.mutate(record, offset, declared_len, reader, |content, record, reader| {
            content.append(record, reader)
        })
    }

    fn insert(&self, blob: &Blob, offset: i64, reader: &mut dyn Read) -> EngineResult<(Blob, u64)> {
        let offset = u64::try_from(offset).map_err(|_| EngineError::InvalidOffset(offset))?;
        let record = self.ensure_metadata(blob)?;
        self.mutate(record, offset, None, reader, |content, record, reader| {
            content.insert(record, offset, reader)
        })
    }

    /// Remove content, then the record.
    ///
    /// A record with no content behind it (described but never uploaded)
    /// is removed without calling the content store's delete. Any error the
    /// content store does report is returned unchanged and the record kept.
    fn delete(&self, blob: &Blob) -> EngineResult<Blob> {
        let record = self.metadata.retrieve_blob_by_id(blob.id)?;

        if self.content.contains_blob(&record)? {
            let released = self.content.delete(&record)?;
            debug!(id = %record.id, released, "content removed");
        } else {
            debug!(id = %record.id, "no content stored for blob, removing record only");
        }

        let removed = self.metadata.delete_blob_by_id(record.id)?;
        info!(id = %removed.id, "blob deleted");
        Ok(removed)
    }

    fn retrieve(&self, blob: &Blob, writer: &mut dyn Write) -> EngineResult<u64> {
        Ok(self.content.retrieve(blob, writer)?)
    }

    fn url_for(&self, blob: &Blob) -> EngineResult<String> {
        Ok(self.content.url_for(blob)?)
    }

    fn contains_blob(&self, blob: &Blob) -> EngineResult<bool> {
        Ok(self.content.contains_blob(blob)?)
    }

    fn describe(&self, id: BlobId) -> EngineResult<Blob> {
        Ok(self.metadata.retrieve_blob_by_id(id)?)
    }
}
