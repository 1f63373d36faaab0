//! # Snapshot Record
//!
//! Durable shape of the watch state:
//!
//! ```json
//! {
//!   "last_seen_proposal": 123456,
//!   "chat_ids": { "42": { "governance": true } }
//! }
//! ```
//!
//! Only `true` topic entries are meaningful; `false` entries are ignored on
//! restore. Restored topics are re-normalized and re-validated, so a
//! hand-edited file cannot smuggle oversized blocklists back in.

use super::entities::{ProposalId, SubscriberId, Topic};
use super::errors::SnapshotError;
use super::registry::Blocklist;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Serialized `{watermark, registry}` pair.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub last_seen_proposal: ProposalId,
    #[serde(default)]
    pub chat_ids: BTreeMap<i64, BTreeMap<String, bool>>,
}

impl Snapshot {
    /// Build a snapshot from the live registry map and watermark.
    pub fn capture(watermark: ProposalId, entries: &HashMap<SubscriberId, Blocklist>) -> Self {
        let chat_ids = entries
            .iter()
            .map(|(id, blocklist)| {
                let topics = blocklist
                    .iter()
                    .map(|topic| (topic.as_str().to_string(), true))
                    .collect();
                (id.0, topics)
            })
            .collect();

        Self {
            last_seen_proposal: watermark,
            chat_ids,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        serde_json::to_vec_pretty(self).map_err(SnapshotError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        serde_json::from_slice(bytes).map_err(SnapshotError::Decode)
    }

    /// Split into the watermark and sanitized registry entries.
    pub fn into_parts(self) -> (ProposalId, Vec<(SubscriberId, Blocklist)>) {
        let entries = self
            .chat_ids
            .into_iter()
            .map(|(id, topics)| {
                let blocklist = topics
                    .into_iter()
                    .filter(|(_, blocked)| *blocked)
                    .filter_map(|(topic, _)| Topic::parse_blockable(&topic))
                    .collect();
                (SubscriberId(id), blocklist)
            })
            .collect();

        (self.last_seen_proposal, entries)
    }

    pub fn subscriber_count(&self) -> usize {
        self.chat_ids.len()
    }
}
