//! Adapters layer.
//!
//! Storage implementations of the [`SnapshotStore`](crate::ports::SnapshotStore) port.

pub mod file_store;
pub mod memory;

pub use file_store::FileSnapshotStore;
pub use memory::InMemorySnapshotStore;
