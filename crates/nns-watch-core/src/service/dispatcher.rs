//! # Notification Dispatcher
//!
//! Turns a poll batch into notifications:
//!
//! ```text
//! batch ──sort by id──→ for each proposal
//!                          │
//!                 advance_if_newer(id)? ──no──→ skip
//!                          │ yes
//!                 format ─→ eligible_recipients(topic)
//!                          │
//!                 notify each recipient
//!                   ├─ Delivered            → count
//!                   ├─ RecipientUnreachable → unsubscribe
//!                   └─ Failed               → log, drop
//! ```
//!
//! Delivery is at-least-once per process lifetime and at-most-once per
//! watermark value: the watermark advances before fan-out, and there is no
//! retry queue.

use crate::domain::{DeliveryError, MessageFormatter, Proposal, ProposalId, SubscriberId};
use crate::ports::{DeliveryOutcome, Notifier};
use crate::service::WatchState;
use nns_watch_telemetry::{metric_inc, NOTIFICATIONS, PROPOSALS_DISPATCHED, SUBSCRIBERS_REMOVED};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound on a single `notify` call.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Fan-out result for one proposal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProposalReport {
    pub proposal_id: ProposalId,
    pub recipients: usize,
    pub delivered: usize,
    pub removed: Vec<SubscriberId>,
    pub failed: usize,
}

/// Result for a whole poll batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Proposals that passed the watermark, in dispatch order.
    pub dispatched: Vec<ProposalReport>,
    /// Proposals at or below the watermark.
    pub skipped: usize,
}

impl DispatchReport {
    pub fn dispatched_ids(&self) -> Vec<ProposalId> {
        self.dispatched.iter().map(|r| r.proposal_id).collect()
    }

    pub fn delivered(&self) -> usize {
        self.dispatched.iter().map(|r| r.delivered).sum()
    }
}

pub struct NotificationDispatcher {
    state: Arc<WatchState>,
    notifier: Arc<dyn Notifier>,
    formatter: MessageFormatter,
    delivery_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        state: Arc<WatchState>,
        notifier: Arc<dyn Notifier>,
        formatter: MessageFormatter,
    ) -> Self {
        Self {
            state,
            notifier,
            formatter,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Dispatch every proposal of `batch` that is newer than the watermark.
    ///
    /// The batch is sorted by id first so the watermark only moves forward
    /// even when the feed is unordered.
    pub async fn process_batch(&self, mut batch: Vec<Proposal>) -> DispatchReport {
        batch.sort_by_key(|p| p.id);

        let mut report = DispatchReport::default();
        for proposal in &batch {
            if !self.state.watermark().advance_if_newer(proposal.id) {
                report.skipped += 1;
                continue;
            }
            report.dispatched.push(self.dispatch(proposal).await);
        }

        self.state.refresh_gauges();
        report
    }

    /// Fan `proposal` out to every eligible subscriber.
    ///
    /// Callers must have passed the watermark gate for `proposal.id`.
    pub async fn dispatch(&self, proposal: &Proposal) -> ProposalReport {
        let text = self.formatter.format(proposal);
        let recipients = self
            .state
            .registry()
            .eligible_recipients(&proposal.topic_key());

        info!(
            proposal_id = proposal.id,
            topic = %proposal.topic,
            spam = proposal.spam,
            recipients = recipients.len(),
            "New proposal detected"
        );

        let mut report = ProposalReport {
            proposal_id: proposal.id,
            recipients: recipients.len(),
            ..ProposalReport::default()
        };

        for recipient in recipients {
            let outcome = self.deliver(recipient, &text).await;
            metric_inc!(NOTIFICATIONS, &[outcome.label()]);

            match outcome {
                DeliveryOutcome::Delivered => report.delivered += 1,
                DeliveryOutcome::RecipientUnreachable => {
                    if self.state.registry().unsubscribe(recipient) {
                        metric_inc!(SUBSCRIBERS_REMOVED);
                    }
                    info!(subscriber = %recipient, "Recipient unreachable, unsubscribed");
                    report.removed.push(recipient);
                }
                DeliveryOutcome::Failed(reason) => {
                    warn!(
                        proposal_id = proposal.id,
                        subscriber = %recipient,
                        reason = %reason,
                        "Couldn't send notification"
                    );
                    report.failed += 1;
                }
            }
        }

        metric_inc!(PROPOSALS_DISPATCHED);
        info!(
            proposal_id = proposal.id,
            delivered = report.delivered,
            removed = report.removed.len(),
            failed = report.failed,
            "Proposal dispatched"
        );
        report
    }

    async fn deliver(&self, recipient: SubscriberId, text: &str) -> DeliveryOutcome {
        deliver_bounded(self.notifier.as_ref(), recipient, text, self.delivery_timeout).await
    }
}

/// One delivery attempt bounded by `timeout`; a timeout counts as a failure.
pub async fn deliver_bounded(
    notifier: &dyn Notifier,
    recipient: SubscriberId,
    text: &str,
    timeout: Duration,
) -> DeliveryOutcome {
    match tokio::time::timeout(timeout, notifier.notify(recipient, text)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!(subscriber = %recipient, "Delivery timed out");
            DeliveryOutcome::Failed(DeliveryError::Timeout {
                after_ms: timeout.as_millis() as u64,
            })
        }
    }
}
