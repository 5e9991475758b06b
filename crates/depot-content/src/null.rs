use std::io::{self, Read, Write};

use depot_types::Blob;

use crate::error::{ContentError, ContentResult};
use crate::traits::{ContentStore, ContentWrite};

/// A content store that discards everything written to it.
///
/// Writes consume their reader and report the bytes seen, so callers still
/// get accurate sizes. Nothing can be read back.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullContentStore;

impl NullContentStore {
    pub fn new() -> Self {
        Self
    }

    fn discard(blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        let written = io::copy(reader, &mut io::sink())?;
        Ok(ContentWrite::new(blob, written, 0, written))
    }
}

impl ContentStore for NullContentStore {
    fn contains_blob(&self, _blob: &Blob) -> ContentResult<bool> {
        Ok(false)
    }

    fn write(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        Self::discard(blob, reader)
    }

    fn append(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        Self::discard(blob, reader)
    }

    fn insert(&self, blob: &Blob, offset: u64, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        let written = io::copy(reader, &mut io::sink())?;
        Ok(ContentWrite::new(blob, written, 0, offset + written))
    }

    fn delete(&self, _blob: &Blob) -> ContentResult<u64> {
        Ok(0)
    }

    fn retrieve(&self, _blob: &Blob, _writer: &mut dyn Write) -> ContentResult<u64> {
        Err(ContentError::MethodNotSupported("retrieve"))
    }

    fn estimate_size_of_managed_content(&self) -> ContentResult<i64> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_types::{BlobClass, BlobId};

    #[test]
    fn swallows_content_but_reports_size() {
        let store = NullContentStore::new();
        let blob = Blob::new("n", "b", BlobClass::Temporary, "o").with_id(BlobId::new(1));

        let out = store.write(&blob, &mut &b"discarded"[..]).unwrap();
        assert_eq!(out.written, 9);
        assert_eq!(out.blob.size, 9);
        assert!(!store.contains_blob(&blob).unwrap());
        assert_eq!(store.delete(&blob).unwrap(), 0);
        assert!(matches!(
            store.retrieve(&blob, &mut Vec::new()),
            Err(ContentError::MethodNotSupported(_))
        ));
    }
}
