//! Core entities: subscribers, topics and proposals.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Maximum number of topics a subscriber may block.
pub const MAX_BLOCKED_TOPICS: usize = 30;

/// Maximum length (in characters) of a single blocked topic.
pub const MAX_TOPIC_LENGTH: usize = 50;

/// Opaque subscriber identifier (the messaging channel's chat id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(pub i64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SubscriberId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Proposal identifier as assigned by the governance canister.
pub type ProposalId = u64;

/// A topic in normalized form.
///
/// Normalization case-folds, strips one leading `#` and drops all
/// whitespace, so `"#Subnet Management"`, `"subnetmanagement"` and
/// `"SubnetManagement"` are the same topic.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    /// Normalize caller-supplied text into a topic key.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        let without_hash = trimmed.strip_prefix('#').unwrap_or(trimmed);
        let normalized = without_hash
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        Self(normalized)
    }

    /// Normalize and check the length bounds used for blocklist entries.
    ///
    /// Returns `None` for empty topics or topics longer than
    /// [`MAX_TOPIC_LENGTH`] characters.
    pub fn parse_blockable(raw: &str) -> Option<Self> {
        let topic = Self::normalize(raw);
        let len = topic.0.chars().count();
        (len > 0 && len <= MAX_TOPIC_LENGTH).then_some(topic)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A governance proposal as delivered by the feed. Read-only to the core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(alias = "proposal_id")]
    pub id: ProposalId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, deserialize_with = "proposer_as_text")]
    pub proposer: String,
    /// Flagged by the feed as spam.
    #[serde(default)]
    pub spam: bool,
}

impl Proposal {
    pub fn new(id: ProposalId, title: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            topic: topic.into(),
            summary: String::new(),
            proposer: String::new(),
            spam: false,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_proposer(mut self, proposer: impl Into<String>) -> Self {
        self.proposer = proposer.into();
        self
    }

    pub fn flagged_spam(mut self) -> Self {
        self.spam = true;
        self
    }

    /// Normalized topic key used for blocklist matching.
    pub fn topic_key(&self) -> Topic {
        Topic::normalize(&self.topic)
    }
}

/// Neuron ids arrive as JSON numbers from some feeds and as strings from others.
fn proposer_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
        Missing(()),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Number(n) => n.to_string(),
        Repr::Text(s) => s,
        Repr::Missing(()) => String::new(),
    })
}
