//! Outbound (Driven) ports.
//!
//! These traits are the seams to everything outside the watch core: the
//! proposal feed, the delivery channel, the inbound command channel and
//! durable snapshot storage.

use crate::domain::{
    ChannelError, DeliveryError, FeedError, Proposal, Snapshot, SnapshotError, SubscriberId,
};
use async_trait::async_trait;
use tracing::warn;

/// Source of proposals, polled once per cycle.
#[async_trait]
pub trait ProposalFeed: Send + Sync {
    /// Fetch the current batch. Order is not guaranteed.
    async fn fetch(&self) -> Result<Vec<Proposal>, FeedError>;
}

/// Result of one delivery attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The recipient blocked the bot or the chat no longer exists.
    RecipientUnreachable,
    /// Any other failure; the recipient stays subscribed.
    Failed(DeliveryError),
}

impl DeliveryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::RecipientUnreachable => "unreachable",
            Self::Failed(_) => "failed",
        }
    }
}

/// Delivery capability for notifications and command replies.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: SubscriberId, text: &str) -> DeliveryOutcome;
}

/// A text message received from a subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    pub sender: SubscriberId,
    pub text: String,
}

/// Source of subscriber commands.
#[async_trait]
pub trait CommandSource: Send + Sync {
    /// Wait for the next batch of messages. May return an empty batch.
    async fn next_messages(&self) -> Result<Vec<IncomingMessage>, ChannelError>;
}

/// Durable storage for snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Persist `snapshot`, replacing the previous one atomically.
    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError>;

    /// Read the last saved snapshot, `Ok(None)` if none exists.
    fn load(&self) -> Result<Option<Snapshot>, SnapshotError>;

    /// Read the last snapshot, falling back to the zero state.
    ///
    /// A missing or unreadable snapshot is not fatal: the service starts with
    /// watermark 0 and no subscribers.
    fn load_or_default(&self) -> Snapshot {
        match self.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => Snapshot::default(),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable snapshot, starting from empty state");
                Snapshot::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    impl SnapshotStore for BrokenStore {
        fn save(&self, _snapshot: &Snapshot) -> Result<(), SnapshotError> {
            Ok(())
        }

        fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
            Err(SnapshotError::Task("disk on fire".to_string()))
        }
    }

    #[test]
    fn test_load_or_default_on_error() {
        assert_eq!(BrokenStore.load_or_default(), Snapshot::default());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(DeliveryOutcome::Delivered.label(), "delivered");
        assert_eq!(DeliveryOutcome::RecipientUnreachable.label(), "unreachable");
        let failed = DeliveryOutcome::Failed(DeliveryError::Transport("reset".into()));
        assert_eq!(failed.label(), "failed");
    }
}
