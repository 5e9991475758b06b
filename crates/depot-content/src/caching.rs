//! Bounded read cache in front of another content store.
//!
//! Records are kept until the cached total exceeds `stretch_size`, at which
//! point a sweep evicts the least recently used ones. Crossing
//! `maximum_size` forces the sweep to run on the calling thread; otherwise it
//! is handed to a background thread.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::thread;

use bytes::Bytes;
use depot_types::{Blob, BlobId};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ContentError, ContentResult};
use crate::traits::{ContentStore, ContentWrite};

/// Point-in-time view of cache occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub cached_bytes: u64,
    pub hits: u64,
    pub misses: u64,
}

struct CacheRecord {
    payload: Bytes,
    // Logical access time; larger is more recent.
    last_accessed: AtomicU64,
}

#[derive(Default)]
struct CacheState {
    records: HashMap<BlobId, CacheRecord>,
    stored_size: u64,
    maintenance_scheduled: bool,
    generation: u64,
}

impl CacheState {
    fn evict(&mut self, id: BlobId) {
        if let Some(record) = self.records.remove(&id) {
            self.stored_size -= record.payload.len() as u64;
        }
        self.generation = self.generation.wrapping_add(1);
    }
}

struct CacheShared {
    maximum_size: u64,
    stretch_size: u64,
    state: RwLock<CacheState>,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheShared {
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn invalidate(&self, id: BlobId) {
        self.write_state().evict(id);
    }

    fn sweep(&self) {
        let mut state = self.write_state();
        state.maintenance_scheduled = false;
        if state.stored_size <= self.stretch_size {
            return;
        }

        let mut by_age: Vec<(u64, BlobId)> = state
            .records
            .iter()
            .map(|(id, record)| (record.last_accessed.load(Ordering::Relaxed), *id))
            .collect();
        by_age.sort_unstable();

        let before = state.stored_size;
        let mut evicted = 0usize;
        for (_, id) in by_age {
            if state.stored_size <= self.stretch_size {
                break;
            }
            if let Some(record) = state.records.remove(&id) {
                state.stored_size -= record.payload.len() as u64;
                evicted += 1;
            }
        }
        debug!(evicted, before, after = state.stored_size, "cache sweep finished");
    }
}

/// Read-caching decorator over any [`ContentStore`].
pub struct CachingContentStore<C> {
    inner: C,
    shared: Arc<CacheShared>,
}

impl<C: ContentStore> CachingContentStore<C> {
    /// Wrap `inner`. `stretch_size` must not exceed `maximum_size`.
    pub fn new(inner: C, maximum_size: u64, stretch_size: u64) -> ContentResult<Self> {
        if stretch_size > maximum_size {
            return Err(ContentError::Config(format!(
                "cache stretch size {stretch_size} exceeds maximum size {maximum_size}"
            )));
        }
        Ok(Self {
            inner,
            shared: Arc::new(CacheShared {
                maximum_size,
                stretch_size,
                state: RwLock::new(CacheState::default()),
                clock: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        })
    }

    /// The wrapped store.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.read().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            entries: state.records.len(),
            cached_bytes: state.stored_size,
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
        }
    }

    /// Whether content for `id` is currently held in memory.
    pub fn is_cached(&self, id: BlobId) -> bool {
        let state = self.shared.state.read().unwrap_or_else(PoisonError::into_inner);
        state.records.contains_key(&id)
    }

    /// Run an eviction sweep on the calling thread.
    pub fn run_maintenance(&self) {
        self.shared.sweep();
    }

    fn maintain(&self) {
        let stored = {
            let state = self.shared.state.read().unwrap_or_else(PoisonError::into_inner);
            state.stored_size
        };

        if stored > self.shared.maximum_size {
            self.shared.sweep();
            return;
        }
        if stored <= self.shared.stretch_size {
            return;
        }

        {
            let mut state = self.shared.write_state();
            if state.maintenance_scheduled {
                return;
            }
            state.maintenance_scheduled = true;
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("depot-cache-sweep".into())
            .spawn(move || shared.sweep());
        if let Err(e) = spawned {
            warn!(error = %e, "could not start background cache sweep, sweeping inline");
            self.shared.sweep();
        }
    }

    fn lookup(&self, id: BlobId) -> Option<Bytes> {
        let state = self.shared.state.read().unwrap_or_else(PoisonError::into_inner);
        state.records.get(&id).map(|record| {
            record.last_accessed.store(self.shared.tick(), Ordering::Relaxed);
            record.payload.clone()
        })
    }

    fn mutate<T>(&self, id: BlobId, op: impl FnOnce(&C) -> ContentResult<T>) -> ContentResult<T> {
        self.shared.invalidate(id);
        let result = op(&self.inner);
        self.shared.invalidate(id);
        result
    }
}

impl<C: ContentStore> ContentStore for CachingContentStore<C> {
    fn contains_blob(&self, blob: &Blob) -> ContentResult<bool> {
        if self.is_cached(blob.id) {
            return Ok(true);
        }
        self.inner.contains_blob(blob)
    }

    fn write(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        self.mutate(blob.id, |inner| inner.write(blob, reader))
    }

    fn append(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        self.mutate(blob.id, |inner| inner.append(blob, reader))
    }

    fn insert(&self, blob: &Blob, offset: u64, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
        self.mutate(blob.id, |inner| inner.insert(blob, offset, reader))
    }

    fn delete(&self, blob: &Blob) -> ContentResult<u64> {
        self.mutate(blob.id, |inner| inner.delete(blob))
    }

    fn retrieve(&self, blob: &Blob, writer: &mut dyn Write) -> ContentResult<u64> {
        if let Some(payload) = self.lookup(blob.id) {
            self.shared.hits.fetch_add(1, Ordering::Relaxed);
            writer.write_all(&payload)?;
            return Ok(payload.len() as u64);
        }

        self.shared.misses.fetch_add(1, Ordering::Relaxed);
        let generation = {
            let state = self.shared.state.read().unwrap_or_else(PoisonError::into_inner);
            state.generation
        };

        let mut buffer = Vec::new();
        self.inner.retrieve(blob, &mut buffer)?;
        writer.write_all(&buffer)?;
        let read = buffer.len() as u64;

        if read > self.shared.stretch_size {
            debug!(id = %blob.id, size = read, "payload larger than cache stretch, not cached");
            return Ok(read);
        }

        {
            let mut state = self.shared.write_state();
            if state.generation != generation {
                debug!(id = %blob.id, "content changed during read, not cached");
                return Ok(read);
            }
            let record = CacheRecord {
                payload: Bytes::from(buffer),
                last_accessed: AtomicU64::new(self.shared.tick()),
            };
            if let Some(old) = state.records.insert(blob.id, record) {
                state.stored_size -= old.payload.len() as u64;
            }
            state.stored_size += read;
        }

        self.maintain();
        Ok(read)
    }

    fn url_for(&self, blob: &Blob) -> ContentResult<String> {
        self.inner.url_for(blob)
    }

    fn estimate_size_of_managed_content(&self) -> ContentResult<i64> {
        self.inner.estimate_size_of_managed_content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryContentStore;
    use depot_types::BlobClass;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    fn blob(id: i64) -> Blob {
        Blob::new("n", "b", BlobClass::Temporary, "o").with_id(BlobId::new(id))
    }

    fn cache(max: u64, stretch: u64) -> CachingContentStore<Arc<InMemoryContentStore>> {
        CachingContentStore::new(Arc::new(InMemoryContentStore::new()), max, stretch).unwrap()
    }

    fn read(store: &impl ContentStore, b: &Blob) -> Vec<u8> {
        let mut out = Vec::new();
        store.retrieve(b, &mut out).unwrap();
        out
    }

    #[test]
    fn rejects_stretch_above_maximum() {
        let result = CachingContentStore::new(InMemoryContentStore::new(), 10, 20);
        assert!(matches!(result, Err(ContentError::Config(_))));
    }

    #[test]
    fn second_read_served_from_memory() {
        let store = cache(1024, 512);
        let b = blob(1);
        store.write(&b, &mut &b"cached bytes"[..]).unwrap();

        assert_eq!(read(&store, &b), b"cached bytes");
        assert_eq!(read(&store, &b), b"cached bytes");
        assert_eq!(read(&store, &b), b"cached bytes");

        assert_eq!(store.inner().retrieve_count(), 1);
        let stats = store.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.cached_bytes, 12);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn mutations_invalidate() {
        let store = cache(1024, 512);
        let b = blob(1);
        store.write(&b, &mut &b"first"[..]).unwrap();
        read(&store, &b);
        assert!(store.is_cached(b.id));

        store.append(&b, &mut &b" second"[..]).unwrap();
        assert!(!store.is_cached(b.id));
        assert_eq!(read(&store, &b), b"first second");

        store.insert(&b, 0, &mut &b"F"[..]).unwrap();
        assert_eq!(read(&store, &b), b"First second");

        store.delete(&b).unwrap();
        assert!(!store.is_cached(b.id));
        assert!(matches!(
            store.retrieve(&b, &mut Vec::new()),
            Err(ContentError::NotFound(_))
        ));
    }

    #[test]
    fn oversized_payload_not_cached() {
        let store = cache(100, 10);
        let b = blob(1);
        store.write(&b, &mut &[7u8; 50][..]).unwrap();

        assert_eq!(read(&store, &b).len(), 50);
        assert!(!store.is_cached(b.id));
        assert_eq!(store.stats().cached_bytes, 0);
    }

    #[test]
    fn crossing_maximum_sweeps_oldest_first() {
        let store = cache(25, 20);
        for id in 1..=3 {
            store.write(&blob(id), &mut &[id as u8; 10][..]).unwrap();
        }

        read(&store, &blob(1));
        read(&store, &blob(2));
        // Touch 1 so that 2 becomes the oldest.
        read(&store, &blob(1));
        read(&store, &blob(3));

        let stats = store.stats();
        assert!(stats.cached_bytes <= 20, "cached {} bytes", stats.cached_bytes);
        assert!(!store.is_cached(BlobId::new(2)));
        assert!(store.is_cached(BlobId::new(1)));
        assert!(store.is_cached(BlobId::new(3)));
    }

    #[test]
    fn crossing_stretch_schedules_background_sweep() {
        let store = cache(100, 15);
        store.write(&blob(1), &mut &[1u8; 10][..]).unwrap();
        store.write(&blob(2), &mut &[2u8; 10][..]).unwrap();
        read(&store, &blob(1));
        read(&store, &blob(2));

        let deadline = Instant::now() + Duration::from_secs(5);
        while store.stats().cached_bytes > 15 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(store.stats().cached_bytes, 10);
        assert!(store.is_cached(BlobId::new(2)));
    }

    #[test]
    fn manual_maintenance_is_noop_under_stretch() {
        let store = cache(100, 50);
        store.write(&blob(1), &mut &b"small"[..]).unwrap();
        read(&store, &blob(1));
        store.run_maintenance();
        assert!(store.is_cached(BlobId::new(1)));
    }

    #[test]
    fn contains_consults_cache_then_inner() {
        let store = cache(100, 50);
        let b = blob(1);
        assert!(!store.contains_blob(&b).unwrap());
        store.write(&b, &mut &b"x"[..]).unwrap();
        assert!(store.contains_blob(&b).unwrap());
    }

    #[test]
    fn errors_pass_through_unchanged() {
        let store = cache(100, 50);
        assert!(matches!(
            store.url_for(&blob(1)),
            Err(ContentError::MethodNotSupported("url_for"))
        ));
    }

    /// Runs a one-shot action after the backend has served a read, before
    /// the caller sees the bytes.
    #[derive(Default)]
    struct AfterRead {
        inner: InMemoryContentStore,
        action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl ContentStore for AfterRead {
        fn contains_blob(&self, blob: &Blob) -> ContentResult<bool> {
            self.inner.contains_blob(blob)
        }
        fn write(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
            self.inner.write(blob, reader)
        }
        fn append(&self, blob: &Blob, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
            self.inner.append(blob, reader)
        }
        fn insert(&self, blob: &Blob, offset: u64, reader: &mut dyn Read) -> ContentResult<ContentWrite> {
            self.inner.insert(blob, offset, reader)
        }
        fn delete(&self, blob: &Blob) -> ContentResult<u64> {
            self.inner.delete(blob)
        }
        fn retrieve(&self, blob: &Blob, writer: &mut dyn Write) -> ContentResult<u64> {
            let read = self.inner.retrieve(blob, writer)?;
            let action = self.action.lock().unwrap().take();
            if let Some(action) = action {
                action();
            }
            Ok(read)
        }
    }

    #[test]
    fn write_during_miss_is_not_cached() {
        let store = Arc::new(CachingContentStore::new(AfterRead::default(), 1024, 512).unwrap());
        let b = blob(1);
        store.write(&b, &mut &b"old"[..]).unwrap();

        let racing = Arc::downgrade(&store);
        let target = b.clone();
        *store.inner().action.lock().unwrap() = Some(Box::new(move || {
            if let Some(store) = racing.upgrade() {
                store.write(&target, &mut &b"new"[..]).unwrap();
            }
        }));

        // The miss read the old bytes, then the write landed before admission.
        assert_eq!(read(&*store, &b), b"old");
        assert!(!store.is_cached(b.id));

        assert_eq!(read(&*store, &b), b"new");
        assert!(store.is_cached(b.id));
        assert_eq!(read(&*store, &b), b"new");
    }

    fn version(n: u8) -> Vec<u8> {
        vec![n; 32]
    }

    fn is_version(data: &[u8]) -> bool {
        data.len() == 32 && data.iter().all(|&byte| byte == data[0])
    }

    #[test]
    fn concurrent_reads_never_keep_stale_content() {
        const LAST: u8 = 200;
        let store = Arc::new(cache(1 << 20, 1 << 19));
        let b = blob(1);
        store.write(&b, &mut &version(0)[..]).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let done = Arc::clone(&done);
                let b = b.clone();
                thread::spawn(move || {
                    while !done.load(Ordering::SeqCst) {
                        let data = read(&*store, &b);
                        assert!(is_version(&data), "read mixed content: {data:?}");
                    }
                })
            })
            .collect();

        let writer = {
            let store = Arc::clone(&store);
            let b = b.clone();
            thread::spawn(move || {
                for n in 1..=LAST {
                    store.write(&b, &mut &version(n)[..]).unwrap();
                }
            })
        };

        writer.join().unwrap();
        done.store(true, Ordering::SeqCst);
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(read(&*store, &b), version(LAST));
        assert_eq!(read(&*store, &b), version(LAST));
        assert!(store.is_cached(b.id));
    }
}
