//! # Subscriber Registry
//!
//! Concurrent map of subscriber → topic blocklist.
//!
//! ## Invariants
//!
//! - A present key means "currently subscribed"; removal is the only unsubscribe.
//! - An empty blocklist means "receive every topic".
//! - Blocklists never exceed [`MAX_BLOCKED_TOPICS`] entries, and no entry is
//!   longer than [`MAX_TOPIC_LENGTH`](super::entities::MAX_TOPIC_LENGTH).
//!
//! ## Locking
//!
//! A single `RwLock` guards the whole map. Reads (queries, recipient scans,
//! snapshot export) share the lock; every mutation takes it exclusively, so a
//! recipient scan always sees one consistent version of the map.

use super::entities::{SubscriberId, Topic, MAX_BLOCKED_TOPICS};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

/// Per-subscriber set of blocked topics (normalized).
pub type Blocklist = BTreeSet<Topic>;

/// Result of a [`SubscriberRegistry::block`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The topic was added.
    Blocked,
    /// The topic was already blocked.
    AlreadyBlocked,
    /// The subscriber is not registered.
    NotSubscribed,
    /// The topic is empty or too long after normalization.
    InvalidTopic,
    /// The blocklist is full and the topic is new.
    LimitReached,
}

/// Result of a [`SubscriberRegistry::unblock`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnblockOutcome {
    Unblocked,
    NotBlocked,
    NotSubscribed,
}

/// In-memory registry of subscribers and their blocklists.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    entries: RwLock<HashMap<SubscriberId, Blocklist>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from restored entries.
    ///
    /// Blocklists are truncated to [`MAX_BLOCKED_TOPICS`] entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (SubscriberId, Blocklist)>) -> Self {
        let registry = Self::new();
        registry.replace_all(entries);
        registry
    }

    /// Subscribe `id` with an empty blocklist.
    ///
    /// Re-subscribing resets any existing blocklist. Returns `true` if the
    /// subscriber was not registered before.
    pub fn subscribe(&self, id: SubscriberId) -> bool {
        self.entries.write().insert(id, Blocklist::new()).is_none()
    }

    /// Remove `id`. Returns `true` if it was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.entries.write().remove(&id).is_some()
    }

    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.entries.read().contains_key(&id)
    }

    /// Add `raw_topic` (normalized) to the blocklist of `id`.
    pub fn block(&self, id: SubscriberId, raw_topic: &str) -> BlockOutcome {
        let Some(topic) = Topic::parse_blockable(raw_topic) else {
            return BlockOutcome::InvalidTopic;
        };

        let mut entries = self.entries.write();
        let Some(blocklist) = entries.get_mut(&id) else {
            return BlockOutcome::NotSubscribed;
        };

        if blocklist.contains(&topic) {
            return BlockOutcome::AlreadyBlocked;
        }
        if blocklist.len() >= MAX_BLOCKED_TOPICS {
            return BlockOutcome::LimitReached;
        }

        blocklist.insert(topic);
        BlockOutcome::Blocked
    }

    /// Remove `raw_topic` (normalized) from the blocklist of `id`.
    pub fn unblock(&self, id: SubscriberId, raw_topic: &str) -> UnblockOutcome {
        let topic = Topic::normalize(raw_topic);

        let mut entries = self.entries.write();
        match entries.get_mut(&id) {
            None => UnblockOutcome::NotSubscribed,
            Some(blocklist) => {
                if blocklist.remove(&topic) {
                    UnblockOutcome::Unblocked
                } else {
                    UnblockOutcome::NotBlocked
                }
            }
        }
    }

    /// Blocked topics of `id` in sorted order, or `None` if not subscribed.
    pub fn blocked_topics(&self, id: SubscriberId) -> Option<Vec<String>> {
        self.entries
            .read()
            .get(&id)
            .map(|blocklist| blocklist.iter().map(|t| t.as_str().to_string()).collect())
    }

    /// Every subscriber whose blocklist does not contain `topic`.
    ///
    /// Computed under one read lock; the result is sorted by id.
    pub fn eligible_recipients(&self, topic: &Topic) -> Vec<SubscriberId> {
        let mut recipients: Vec<SubscriberId> = self
            .entries
            .read()
            .iter()
            .filter(|(_, blocklist)| !blocklist.contains(topic))
            .map(|(id, _)| *id)
            .collect();
        recipients.sort_unstable();
        recipients
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Run `f` against the map while holding the read lock.
    pub fn export_with<R>(&self, f: impl FnOnce(&HashMap<SubscriberId, Blocklist>) -> R) -> R {
        f(&self.entries.read())
    }

    /// Replace the whole map, e.g. after loading a snapshot.
    pub fn replace_all(&self, entries: impl IntoIterator<Item = (SubscriberId, Blocklist)>) {
        let restored = entries
            .into_iter()
            .map(|(id, blocklist)| {
                let capped = blocklist.into_iter().take(MAX_BLOCKED_TOPICS).collect();
                (id, capped)
            })
            .collect();
        *self.entries.write() = restored;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::MAX_TOPIC_LENGTH;
    use std::sync::Arc;

    const ALICE: SubscriberId = SubscriberId(42);
    const BOB: SubscriberId = SubscriberId(-1001);

    #[test]
    fn test_subscribe_then_unsubscribe_leaves_no_recipient() {
        let registry = SubscriberRegistry::new();
        assert!(registry.subscribe(ALICE));
        assert!(registry.unsubscribe(ALICE));

        assert!(registry.eligible_recipients(&Topic::normalize("x")).is_empty());
        assert!(registry.eligible_recipients(&Topic::normalize("y")).is_empty());
        assert_eq!(registry.blocked_topics(ALICE), None);
    }

    #[test]
    fn test_unsubscribe_absent_is_noop() {
        let registry = SubscriberRegistry::new();
        assert!(!registry.unsubscribe(ALICE));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resubscribe_clears_blocklist() {
        let registry = SubscriberRegistry::new();
        registry.subscribe(ALICE);
        assert_eq!(registry.block(ALICE, "governance"), BlockOutcome::Blocked);

        assert!(!registry.subscribe(ALICE));
        assert_eq!(registry.blocked_topics(ALICE), Some(vec![]));
    }

    #[test]
    fn test_block_forms_are_equivalent() {
        let registry = SubscriberRegistry::new();
        registry.subscribe(ALICE);

        assert_eq!(registry.block(ALICE, "Governance"), BlockOutcome::Blocked);
        assert_eq!(registry.block(ALICE, "#governance"), BlockOutcome::AlreadyBlocked);
        assert_eq!(registry.block(ALICE, "governance"), BlockOutcome::AlreadyBlocked);
        assert_eq!(
            registry.blocked_topics(ALICE),
            Some(vec!["governance".to_string()])
        );

        assert_eq!(registry.unblock(ALICE, "#GOVERNANCE"), UnblockOutcome::Unblocked);
        assert_eq!(registry.blocked_topics(ALICE), Some(vec![]));
    }

    #[test]
    fn test_unblock_each_form_removes_same_entry() {
        for form in ["Governance", "#governance", "governance"] {
            let registry = SubscriberRegistry::new();
            registry.subscribe(ALICE);
            registry.block(ALICE, "governance");
            assert_eq!(registry.unblock(ALICE, form), UnblockOutcome::Unblocked);
        }
    }

    #[test]
    fn test_unblock_topic_never_blocked() {
        let registry = SubscriberRegistry::new();
        registry.subscribe(ALICE);
        registry.block(ALICE, "governance");

        assert_eq!(registry.unblock(ALICE, "#ExchangeRate"), UnblockOutcome::NotBlocked);
        assert_eq!(
            registry.blocked_topics(ALICE),
            Some(vec!["governance".to_string()])
        );

        assert_eq!(registry.unblock(ALICE, "governance"), UnblockOutcome::Unblocked);
        assert_eq!(registry.unblock(ALICE, "governance"), UnblockOutcome::NotBlocked);
    }

    #[test]
    fn test_block_unknown_subscriber_is_noop() {
        let registry = SubscriberRegistry::new();
        assert_eq!(registry.block(ALICE, "x"), BlockOutcome::NotSubscribed);
        assert_eq!(registry.unblock(ALICE, "x"), UnblockOutcome::NotSubscribed);
        assert!(!registry.is_subscribed(ALICE));
    }

    #[test]
    fn test_blocklist_filters_recipients() {
        let registry = SubscriberRegistry::new();
        registry.subscribe(ALICE);
        registry.block(ALICE, "x");

        assert!(registry.eligible_recipients(&Topic::normalize("x")).is_empty());
        assert_eq!(
            registry.eligible_recipients(&Topic::normalize("y")),
            vec![ALICE]
        );
    }

    #[test]
    fn test_recipients_sorted_and_complete() {
        let registry = SubscriberRegistry::new();
        registry.subscribe(ALICE);
        registry.subscribe(BOB);

        assert_eq!(
            registry.eligible_recipients(&Topic::normalize("Governance")),
            vec![BOB, ALICE]
        );
    }

    #[test]
    fn test_topic_cap_rejects_new_topic() {
        let registry = SubscriberRegistry::new();
        registry.subscribe(ALICE);
        for i in 0..MAX_BLOCKED_TOPICS {
            assert_eq!(registry.block(ALICE, &format!("t{i}")), BlockOutcome::Blocked);
        }

        let before = registry.blocked_topics(ALICE);
        assert_eq!(registry.block(ALICE, "overflow"), BlockOutcome::LimitReached);
        assert_eq!(registry.blocked_topics(ALICE), before);

        // Re-blocking an existing topic at the cap is still reported as such
        assert_eq!(registry.block(ALICE, "t0"), BlockOutcome::AlreadyBlocked);
    }

    #[test]
    fn test_long_topic_rejected() {
        let registry = SubscriberRegistry::new();
        registry.subscribe(ALICE);

        let long = "a".repeat(MAX_TOPIC_LENGTH + 1);
        assert_eq!(registry.block(ALICE, &long), BlockOutcome::InvalidTopic);
        assert_eq!(registry.blocked_topics(ALICE), Some(vec![]));
    }

    #[test]
    fn test_replace_all_caps_blocklists() {
        let oversized: Blocklist = (0..MAX_BLOCKED_TOPICS + 5)
            .map(|i| Topic::normalize(&format!("t{i}")))
            .collect();
        let registry = SubscriberRegistry::from_entries([(ALICE, oversized)]);

        assert_eq!(
            registry.blocked_topics(ALICE).map(|t| t.len()),
            Some(MAX_BLOCKED_TOPICS)
        );
    }

    #[test]
    fn test_concurrent_mutation_and_scan() {
        let registry = Arc::new(SubscriberRegistry::new());
        let topic = Topic::normalize("governance");

        let writers: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let id = SubscriberId(t * 1000 + i);
                        registry.subscribe(id);
                        registry.block(id, "governance");
                        registry.unblock(id, "governance");
                    }
                })
            })
            .collect();

        for _ in 0..100 {
            let recipients = registry.eligible_recipients(&topic);
            let mut deduped = recipients.clone();
            deduped.dedup();
            assert_eq!(recipients, deduped);
        }

        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(registry.len(), 1600);
        assert_eq!(registry.eligible_recipients(&topic).len(), 1600);
    }
}
