use std::sync::Arc;

use depot_types::BlobId;
use tracing::warn;

use crate::error::SyncResult;

/// Advisory per-blob mutual exclusion.
///
/// Holders must call `unlock` with the same id once their critical section
/// is over; [`SyncGuard`] does that on drop.
pub trait SynchronizationStore: Send + Sync {
    /// Block until the lock for `id` is free, then take it.
    fn lock(&self, id: BlobId) -> SyncResult<()>;

    /// Release the lock for `id`. Releasing an id that was never locked is
    /// not an error.
    fn unlock(&self, id: BlobId) -> SyncResult<()>;
}

impl<T: SynchronizationStore + ?Sized> SynchronizationStore for Arc<T> {
    fn lock(&self, id: BlobId) -> SyncResult<()> {
        (**self).lock(id)
    }

    fn unlock(&self, id: BlobId) -> SyncResult<()> {
        (**self).unlock(id)
    }
}

/// Acquire the lock for `id` and release it when the guard drops.
pub fn guard<S: SynchronizationStore + ?Sized>(store: &S, id: BlobId) -> SyncResult<SyncGuard<'_, S>> {
    store.lock(id)?;
    Ok(SyncGuard { store, id })
}

/// RAII holder of one blob lock.
pub struct SyncGuard<'a, S: SynchronizationStore + ?Sized> {
    store: &'a S,
    id: BlobId,
}

impl<S: SynchronizationStore + ?Sized> SyncGuard<'_, S> {
    pub fn id(&self) -> BlobId {
        self.id
    }
}

impl<S: SynchronizationStore + ?Sized> Drop for SyncGuard<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.store.unlock(self.id) {
            warn!(id = %self.id, error = %e, "failed to release blob lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySynchronizationStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn guard_releases_on_drop() {
        let store = Arc::new(MemorySynchronizationStore::new());
        let id = BlobId::new(5);
        let released = Arc::new(AtomicBool::new(false));

        let g = guard(&*store, id).unwrap();
        assert_eq!(g.id(), id);

        let contender = {
            let store = Arc::clone(&store);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                let _g = guard(&store, id).unwrap();
                assert!(released.load(Ordering::SeqCst));
            })
        };

        thread::sleep(Duration::from_millis(30));
        released.store(true, Ordering::SeqCst);
        drop(g);
        contender.join().unwrap();
    }

    #[test]
    fn works_through_trait_objects() {
        let store: Arc<dyn SynchronizationStore> = Arc::new(MemorySynchronizationStore::new());
        let _g = guard(&store, BlobId::new(1)).unwrap();
    }
}
