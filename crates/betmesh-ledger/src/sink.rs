//! Where committed changes go after the ledger is done with them.

use std::sync::{Mutex, PoisonError};

use betmesh_types::ChangeEvent;

/// Receives every change the ledger commits, for dissemination to peers.
///
/// `publish` is called after the store lock is released and must not block.
/// Implementations swallow their own failures: the ledger call that produced
/// the change has already succeeded.
pub trait ChangeSink: Send + Sync {
    fn publish(&self, change: ChangeEvent);
}

/// Discards everything. Used by single-node setups.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ChangeSink for NullSink {
    fn publish(&self, _change: ChangeEvent) {}
}

/// Keeps every published change in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    changes: Mutex<Vec<ChangeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything published so far.
    pub fn changes(&self) -> Vec<ChangeEvent> {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drains and returns everything published so far.
    pub fn take(&self) -> Vec<ChangeEvent> {
        std::mem::take(&mut *self.changes.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ChangeSink for RecordingSink {
    fn publish(&self, change: ChangeEvent) {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(change);
    }
}
