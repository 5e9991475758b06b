use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use depot_types::BlobId;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::traits::SynchronizationStore;

/// Idle time after which an unused lock record is reclaimed.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(5);

struct LockState {
    held: bool,
    waiters: usize,
    last_acquired: Instant,
}

struct LockRecord {
    state: Mutex<LockState>,
    released: Condvar,
}

impl LockRecord {
    fn new() -> Self {
        Self {
            state: Mutex::new(LockState {
                held: false,
                waiters: 0,
                last_acquired: Instant::now(),
            }),
            released: Condvar::new(),
        }
    }
}

/// In-process lock table keyed by blob id.
///
/// Records are created on first `lock` and reclaimed by a tidy pass once
/// they have been idle for the configured threshold, never while held or
/// while a thread is waiting on them. Lock order is table, then record.
pub struct MemorySynchronizationStore {
    records: Mutex<HashMap<BlobId, Arc<LockRecord>>>,
    idle_threshold: Duration,
}

impl MemorySynchronizationStore {
    pub fn new() -> Self {
        Self::with_idle_threshold(DEFAULT_IDLE_THRESHOLD)
    }

    pub fn with_idle_threshold(idle_threshold: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            idle_threshold,
        }
    }

    /// Number of lock records currently tracked.
    pub fn tracked(&self) -> usize {
        self.records.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// Remove records that are free, unawaited and idle past the threshold.
    /// Returns how many were removed.
    pub fn tidy(&self) -> SyncResult<usize> {
        let mut map = self.table()?;
        Ok(self.tidy_locked(&mut map))
    }

    fn table(&self) -> SyncResult<MutexGuard<'_, HashMap<BlobId, Arc<LockRecord>>>> {
        self.records.lock().map_err(|_| SyncError::Poisoned)
    }

    fn tidy_locked(&self, map: &mut HashMap<BlobId, Arc<LockRecord>>) -> usize {
        let now = Instant::now();
        let before = map.len();
        map.retain(|_, record| match record.state.lock() {
            Ok(state) => {
                state.held
                    || state.waiters > 0
                    || now.duration_since(state.last_acquired) <= self.idle_threshold
            }
            Err(_) => false,
        });
        let removed = before - map.len();
        if removed > 0 {
            debug!(removed, remaining = map.len(), "idle lock records reclaimed");
        }
        removed
    }
}

impl Default for MemorySynchronizationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SynchronizationStore for MemorySynchronizationStore {
    fn lock(&self, id: BlobId) -> SyncResult<()> {
        if !id.is_allocated() {
            return Err(SyncError::InvalidBlobId(id));
        }

        // Registering as a waiter while the table is held keeps tidy from
        // reclaiming the record before this thread waits on it.
        let record = {
            let mut map = self.table()?;
            let record = Arc::clone(map.entry(id).or_insert_with(|| Arc::new(LockRecord::new())));
            record.state.lock().map_err(|_| SyncError::Poisoned)?.waiters += 1;
            record
        };

        let mut state = record.state.lock().map_err(|_| SyncError::Poisoned)?;
        while state.held {
            state = record.released.wait(state).map_err(|_| SyncError::Poisoned)?;
        }
        state.waiters -= 1;
        state.held = true;
        state.last_acquired = Instant::now();

        debug!(%id, "blob lock acquired");
        Ok(())
    }

    fn unlock(&self, id: BlobId) -> SyncResult<()> {
        let mut map = self.table()?;
        let Some(record) = map.get(&id).cloned() else {
            warn!(%id, "unlock requested for a blob that holds no lock");
            return Ok(());
        };

        {
            let mut state = record.state.lock().map_err(|_| SyncError::Poisoned)?;
            state.held = false;
            state.last_acquired = Instant::now();
        }
        record.released.notify_one();
        debug!(%id, "blob lock released");

        self.tidy_locked(&mut map);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn lock_unlock_roundtrip() {
        let store = MemorySynchronizationStore::new();
        let id = BlobId::new(1);
        store.lock(id).unwrap();
        assert_eq!(store.tracked(), 1);
        store.unlock(id).unwrap();
        // Freshly released, so not yet idle.
        assert_eq!(store.tracked(), 1);
    }

    #[test]
    fn unlock_unknown_id_is_noop() {
        let store = MemorySynchronizationStore::new();
        store.unlock(BlobId::new(42)).unwrap();
        assert_eq!(store.tracked(), 0);
    }

    #[test]
    fn pending_id_rejected() {
        let store = MemorySynchronizationStore::new();
        assert!(matches!(
            store.lock(BlobId::PENDING),
            Err(SyncError::InvalidBlobId(_))
        ));
    }

    #[test]
    fn lock_excludes_other_holders() {
        let store = Arc::new(MemorySynchronizationStore::new());
        let id = BlobId::new(7);
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    for _ in 0..20 {
                        store.lock(id).unwrap();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                        store.unlock(id).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_ids_do_not_block() {
        let store = MemorySynchronizationStore::new();
        store.lock(BlobId::new(1)).unwrap();
        store.lock(BlobId::new(2)).unwrap();
        assert_eq!(store.tracked(), 2);
    }

    #[test]
    fn idle_records_reclaimed() {
        let store = MemorySynchronizationStore::with_idle_threshold(Duration::from_millis(20));
        store.lock(BlobId::new(1)).unwrap();
        store.unlock(BlobId::new(1)).unwrap();
        store.lock(BlobId::new(2)).unwrap();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(store.tidy().unwrap(), 1);
        // Still held, so it survives however long it has been idle.
        assert_eq!(store.tracked(), 1);

        store.unlock(BlobId::new(2)).unwrap();
        thread::sleep(Duration::from_millis(50));
        store.unlock(BlobId::new(99)).unwrap();
        assert_eq!(store.tidy().unwrap(), 1);
        assert_eq!(store.tracked(), 0);
    }

    #[test]
    fn awaited_records_survive_tidy() {
        let store = Arc::new(MemorySynchronizationStore::with_idle_threshold(Duration::ZERO));
        let id = BlobId::new(3);
        store.lock(id).unwrap();

        let waiter = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.lock(id).unwrap();
                store.unlock(id).unwrap();
            })
        };

        thread::sleep(Duration::from_millis(50));
        store.tidy().unwrap();
        assert_eq!(store.tracked(), 1);

        store.unlock(id).unwrap();
        waiter.join().unwrap();
    }
}
