//! # Watermark Tracker
//!
//! Holds the highest proposal id ever dispatched. This is the sole
//! deduplication gate: a proposal passes [`WatermarkTracker::advance_if_newer`]
//! at most once, no matter how many callers race on it.

use super::entities::ProposalId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic "last seen proposal" marker.
#[derive(Debug, Default)]
pub struct WatermarkTracker {
    last_seen: AtomicU64,
}

impl WatermarkTracker {
    pub fn new(initial: ProposalId) -> Self {
        Self {
            last_seen: AtomicU64::new(initial),
        }
    }

    /// Raise the watermark to `candidate` if it is strictly greater.
    ///
    /// The compare and the store happen in one atomic read-modify-write, so
    /// of several concurrent callers with the same candidate exactly one
    /// gets `true`.
    pub fn advance_if_newer(&self, candidate: ProposalId) -> bool {
        self.last_seen.fetch_max(candidate, Ordering::AcqRel) < candidate
    }

    pub fn current(&self) -> ProposalId {
        self.last_seen.load(Ordering::Acquire)
    }
}
