use crate::domain::{Snapshot, SnapshotError};
use crate::ports::SnapshotStore;
use parking_lot::Mutex;

/// Snapshot store kept in memory. Used in tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    slot: Mutex<Option<Vec<u8>>>,
    saves: Mutex<usize>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw bytes, valid or not.
    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            slot: Mutex::new(Some(bytes.into())),
            saves: Mutex::new(0),
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let bytes = snapshot.to_bytes()?;
        *self.slot.lock() = Some(bytes);
        *self.saves.lock() += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        self.slot
            .lock()
            .as_deref()
            .map(Snapshot::from_bytes)
            .transpose()
    }
}
