use std::sync::{Arc, Mutex, PoisonError};

use crate::RecordStore;

/// A [`RecordStore`] shared by every task on a node.
///
/// Cloning is cheap and every clone refers to the same tables.
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<RecordStore>>,
}

impl SharedStore {
    pub fn new(store: RecordStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Runs `f` with exclusive access to the store.
    ///
    /// `f` must not block on I/O or await: it holds the node-wide lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut RecordStore) -> R) -> R {
        // A panic inside `f` cannot leave a half-applied batch behind, since
        // commits validate fully before mutating, so the poison flag is ignored.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl From<RecordStore> for SharedStore {
    fn from(store: RecordStore) -> Self {
        Self::new(store)
    }
}
