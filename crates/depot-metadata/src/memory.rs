//! In-memory metadata store for testing and ephemeral use.
//!
//! [`InMemoryMetadataStore`] keeps every record in a `BTreeMap` behind a
//! `RwLock` and allocates ids from a monotonically increasing counter.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use depot_types::{Blob, BlobId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MetadataError, MetadataResult};
use crate::traits::MetadataStore;

/// Serializable image of a metadata store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    /// Last id handed out; the next allocation is one greater.
    pub last_id: i64,
    pub blobs: Vec<Blob>,
}

#[derive(Debug, Default)]
struct Records {
    blobs: BTreeMap<BlobId, Blob>,
    last_id: i64,
}

/// An in-memory implementation of [`MetadataStore`].
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    records: RwLock<Records>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot.
    ///
    /// The id counter never goes backwards past an id present in the
    /// snapshot, even if `last_id` was recorded lower.
    pub fn from_snapshot(snapshot: MetadataSnapshot) -> Self {
        let max_id = snapshot.blobs.iter().map(|b| b.id.get()).max().unwrap_or(0);
        let blobs = snapshot.blobs.into_iter().map(|b| (b.id, b)).collect();
        Self {
            records: RwLock::new(Records {
                blobs,
                last_id: snapshot.last_id.max(max_id),
            }),
        }
    }

    pub fn snapshot(&self) -> MetadataResult<MetadataSnapshot> {
        let records = self.read()?;
        Ok(MetadataSnapshot {
            last_id: records.last_id,
            blobs: records.blobs.values().cloned().collect(),
        })
    }

    /// Replace every record and the id counter with the snapshot's.
    pub(crate) fn restore(&self, snapshot: MetadataSnapshot) -> MetadataResult<()> {
        let restored = Self::from_snapshot(snapshot);
        let records = restored.records.into_inner().map_err(|_| MetadataError::LockPoisoned)?;
        *self.write()? = records;
        Ok(())
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> MetadataResult<RwLockReadGuard<'_, Records>> {
        self.records.read().map_err(|_| MetadataError::LockPoisoned)
    }

    fn write(&self) -> MetadataResult<RwLockWriteGuard<'_, Records>> {
        self.records.write().map_err(|_| MetadataError::LockPoisoned)
    }

    fn matching(&self, pred: impl Fn(&Blob) -> bool) -> MetadataResult<Vec<BlobId>> {
        let records = self.read()?;
        let ids: Vec<BlobId> = records
            .blobs
            .values()
            .filter(|b| pred(b))
            .map(|b| b.id)
            .collect();
        if ids.is_empty() {
            return Err(MetadataError::NoMatchingBlobs);
        }
        Ok(ids)
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn store_blob_record(&self, blob: &Blob) -> MetadataResult<Blob> {
        blob.validate()?;

        let mut records = self.write()?;
        let mut stored = blob.clone();
        if stored.id.is_allocated() {
            records.last_id = records.last_id.max(stored.id.get());
        } else {
            records.last_id += 1;
            stored.id = BlobId::new(records.last_id);
        }

        debug!(id = %stored.id, bucket = %stored.bucket, "blob record stored");
        records.blobs.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn finalize_blob_record(&self, blob: &Blob) -> MetadataResult<Blob> {
        let missing = blob.missing_fields();
        if !missing.is_empty() {
            return Err(MetadataError::IncompleteRecord { id: blob.id, missing });
        }

        let mut records = self.write()?;
        let slot = records
            .blobs
            .get_mut(&blob.id)
            .ok_or(MetadataError::NoMatchingBlobs)?;
        *slot = blob.clone();

        debug!(id = %blob.id, size = blob.size, checksum = %blob.checksum, "blob record finalized");
        Ok(blob.clone())
    }

    fn retrieve_blob_by_id(&self, id: BlobId) -> MetadataResult<Blob> {
        self.read()?
            .blobs
            .get(&id)
            .cloned()
            .ok_or(MetadataError::NoMatchingBlobs)
    }

    fn delete_blob_by_id(&self, id: BlobId) -> MetadataResult<Blob> {
        self.write()?
            .blobs
            .remove(&id)
            .ok_or(MetadataError::NoMatchingBlobs)
    }

    fn blob_ids_matching_checksum(&self, checksum: &str) -> MetadataResult<Vec<BlobId>> {
        self.matching(|b| !b.checksum.is_empty() && b.checksum.eq_ignore_ascii_case(checksum))
    }

    fn blob_ids_matching_name(&self, name: &str) -> MetadataResult<Vec<BlobId>> {
        self.matching(|b| b.name == name)
    }

    fn blob_ids_matching_bucket(&self, bucket: &str) -> MetadataResult<Vec<BlobId>> {
        self.matching(|b| b.bucket == bucket)
    }

    fn all_buckets(&self) -> MetadataResult<Vec<String>> {
        let records = self.read()?;
        let buckets: BTreeSet<&str> = records.blobs.values().map(|b| b.bucket.as_str()).collect();
        Ok(buckets.into_iter().map(str::to_owned).collect())
    }

    fn all_blobs(&self) -> MetadataResult<Vec<Blob>> {
        Ok(self.read()?.blobs.values().cloned().collect())
    }

    fn estimate_size_of_managed_content(&self) -> MetadataResult<i64> {
        Ok(self.read()?.blobs.values().map(|b| b.size as i64).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_types::{BlobClass, BlobQuery};

    fn wip(name: &str, bucket: &str) -> Blob {
        Blob::new(name, bucket, BlobClass::Permanent, "tester")
    }

    fn finalized(store: &InMemoryMetadataStore, name: &str, bucket: &str, checksum: &str) -> Blob {
        let mut blob = store.store_blob_record(&wip(name, bucket)).unwrap();
        blob.checksum = checksum.into();
        blob.size = 10;
        store.finalize_blob_record(&blob).unwrap()
    }

    #[test]
    fn store_allocates_increasing_ids() {
        let store = InMemoryMetadataStore::new();
        let a = store.store_blob_record(&wip("a", "x")).unwrap();
        let b = store.store_blob_record(&wip("b", "x")).unwrap();
        assert_eq!(a.id, BlobId::new(1));
        assert_eq!(b.id, BlobId::new(2));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn store_keeps_explicit_id_and_advances_counter() {
        let store = InMemoryMetadataStore::new();
        let explicit = store.store_blob_record(&wip("a", "x").with_id(BlobId::new(10))).unwrap();
        assert_eq!(explicit.id, BlobId::new(10));
        let next = store.store_blob_record(&wip("b", "x")).unwrap();
        assert_eq!(next.id, BlobId::new(11));
    }

    #[test]
    fn store_rejects_invalid_record() {
        let store = InMemoryMetadataStore::new();
        assert!(matches!(
            store.store_blob_record(&wip("", "x")),
            Err(MetadataError::InvalidRecord(_))
        ));
    }

    #[test]
    fn finalize_requires_complete_record() {
        let store = InMemoryMetadataStore::new();
        let blob = store.store_blob_record(&wip("a", "x")).unwrap();

        match store.finalize_blob_record(&blob) {
            Err(MetadataError::IncompleteRecord { missing, .. }) => assert_eq!(missing, vec!["checksum"]),
            other => panic!("expected incomplete record, got {other:?}"),
        }

        let mut unknown = blob.clone().with_id(BlobId::new(99));
        unknown.checksum = "ab".repeat(32);
        assert!(matches!(
            store.finalize_blob_record(&unknown),
            Err(MetadataError::NoMatchingBlobs)
        ));
    }

    #[test]
    fn retrieve_and_delete() {
        let store = InMemoryMetadataStore::new();
        let blob = finalized(&store, "a", "x", "aa");
        assert_eq!(store.retrieve_blob_by_id(blob.id).unwrap(), blob);

        assert_eq!(store.delete_blob_by_id(blob.id).unwrap().id, blob.id);
        assert!(matches!(
            store.retrieve_blob_by_id(blob.id),
            Err(MetadataError::NoMatchingBlobs)
        ));
        assert!(matches!(
            store.delete_blob_by_id(blob.id),
            Err(MetadataError::NoMatchingBlobs)
        ));
    }

    #[test]
    fn matching_lookups() {
        let store = InMemoryMetadataStore::new();
        let a = finalized(&store, "a.txt", "docs", "aa");
        let b = finalized(&store, "b.txt", "docs", "bb");
        let c = finalized(&store, "a.txt", "images", "aa");

        assert_eq!(store.blob_ids_matching_name("a.txt").unwrap(), vec![a.id, c.id]);
        assert_eq!(store.blob_ids_matching_bucket("docs").unwrap(), vec![a.id, b.id]);
        assert_eq!(store.blob_ids_matching_checksum("AA").unwrap(), vec![a.id, c.id]);
        assert!(matches!(
            store.blob_ids_matching_bucket("nope"),
            Err(MetadataError::NoMatchingBlobs)
        ));
    }

    #[test]
    fn unfinalized_records_never_match_checksum() {
        let store = InMemoryMetadataStore::new();
        store.store_blob_record(&wip("a", "x")).unwrap();
        assert!(matches!(
            store.blob_ids_matching_checksum(""),
            Err(MetadataError::NoMatchingBlobs)
        ));
    }

    #[test]
    fn search_is_union_of_criteria() {
        let store = InMemoryMetadataStore::new();
        let a = finalized(&store, "a.txt", "docs", "aa");
        let b = finalized(&store, "b.txt", "images", "bb");
        finalized(&store, "c.txt", "other", "cc");

        let query = BlobQuery {
            name: Some("a.txt".into()),
            bucket: Some("images".into()),
            checksum: Some("aa".into()),
        };
        assert_eq!(store.search(&query).unwrap(), vec![a.id, b.id]);

        assert!(matches!(
            store.search(&BlobQuery::default()),
            Err(MetadataError::InvalidQuery)
        ));
        assert!(matches!(
            store.search(&BlobQuery::by_name("zzz")),
            Err(MetadataError::NoMatchingBlobs)
        ));
    }

    #[test]
    fn buckets_and_estimate() {
        let store = InMemoryMetadataStore::new();
        finalized(&store, "a", "zeta", "aa");
        finalized(&store, "b", "alpha", "bb");
        finalized(&store, "c", "zeta", "cc");

        assert_eq!(store.all_buckets().unwrap(), vec!["alpha", "zeta"]);
        assert_eq!(store.all_blobs().unwrap().len(), 3);
        assert_eq!(store.estimate_size_of_managed_content().unwrap(), 30);
    }

    #[test]
    fn snapshot_roundtrip_keeps_counter() {
        let store = InMemoryMetadataStore::new();
        finalized(&store, "a", "x", "aa");
        let b = store.store_blob_record(&wip("b", "x")).unwrap();
        store.delete_blob_by_id(b.id).unwrap();

        let restored = InMemoryMetadataStore::from_snapshot(store.snapshot().unwrap());
        assert_eq!(restored.len(), 1);
        // Id 2 was handed out before, so it is not reused.
        let next = restored.store_blob_record(&wip("c", "x")).unwrap();
        assert_eq!(next.id, BlobId::new(3));
    }
}
