//! Shared watch state.
//!
//! One explicitly constructed object owns the registry and the watermark and
//! is handed (behind an `Arc`) to the poll, command and persistence workers.

use crate::domain::{Snapshot, SubscriberRegistry, WatermarkTracker};
use crate::ports::SnapshotStore;
use nns_watch_telemetry::{SUBSCRIBERS, WATERMARK};
use tracing::info;

/// Registry and watermark, the single source of truth.
#[derive(Debug, Default)]
pub struct WatchState {
    registry: SubscriberRegistry,
    watermark: WatermarkTracker,
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let (last_seen, entries) = snapshot.into_parts();
        let state = Self {
            registry: SubscriberRegistry::from_entries(entries),
            watermark: WatermarkTracker::new(last_seen),
        };
        state.refresh_gauges();
        state
    }

    /// Load the last snapshot from `store`, or start empty.
    pub fn restore(store: &dyn SnapshotStore) -> Self {
        let state = Self::from_snapshot(store.load_or_default());
        info!(
            last_seen_proposal = state.watermark.current(),
            subscribers = state.registry.len(),
            "Watch state restored"
        );
        state
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    pub fn watermark(&self) -> &WatermarkTracker {
        &self.watermark
    }

    /// Copy the current registry and watermark into a snapshot.
    ///
    /// The registry read lock is held while the watermark is read, so
    /// concurrent subscription changes cannot tear the registry half.
    pub fn capture(&self) -> Snapshot {
        self.registry
            .export_with(|entries| Snapshot::capture(self.watermark.current(), entries))
    }

    pub fn refresh_gauges(&self) {
        SUBSCRIBERS.set(self.registry.len() as f64);
        WATERMARK.set(self.watermark.current() as f64);
    }
}
