//! Notification text for a proposal.
//!
//! Messages are HTML (the delivery channel renders `<b>`); every piece of
//! feed-controlled text is escaped before it is embedded.

use super::entities::Proposal;

/// Default bound on the embedded summary, in characters.
pub const DEFAULT_MAX_SUMMARY_LENGTH: usize = 2048;

/// Default base URL for proposal links.
pub const DEFAULT_DASHBOARD_URL: &str = "https://dashboard.internetcomputer.org/proposal";

/// Placeholder used when a summary would exceed the bound.
pub const SUMMARY_TOO_LONG: &str = "[Proposal summary is too long.]";

/// Renders proposals into notification text.
#[derive(Clone, Debug)]
pub struct MessageFormatter {
    max_summary_length: usize,
    dashboard_url: String,
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SUMMARY_LENGTH, DEFAULT_DASHBOARD_URL)
    }
}

impl MessageFormatter {
    pub fn new(max_summary_length: usize, dashboard_url: impl Into<String>) -> Self {
        Self {
            max_summary_length,
            dashboard_url: dashboard_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn format(&self, proposal: &Proposal) -> String {
        let link = self.proposal_link(proposal);

        if proposal.spam {
            return format!("SPAM PROPOSAL DETECTED\n\n{link}");
        }

        format!(
            "<b>{title}</b>\n\nProposer: {proposer}\n{summary}\n{hashtag}\n\n{link}",
            title = escape_html(&proposal.title),
            proposer = escape_html(&proposal.proposer),
            summary = self.summary_block(&proposal.summary),
            hashtag = hashtag(&proposal.topic),
        )
    }

    pub fn proposal_link(&self, proposal: &Proposal) -> String {
        format!("{}/{}", self.dashboard_url, proposal.id)
    }

    /// The summary surrounded by blank lines, the placeholder, or nothing.
    fn summary_block(&self, summary: &str) -> String {
        if summary.is_empty() {
            return String::new();
        }
        if summary.chars().count() + 2 > self.max_summary_length {
            return format!("\n{SUMMARY_TOO_LONG}\n");
        }
        format!("\n{}\n", escape_html(summary))
    }
}

/// Render a topic as a hashtag, e.g. `"Subnet Management"` → `#SubnetManagement`.
pub fn hashtag(topic: &str) -> String {
    let compact: String = topic.chars().filter(|c| !c.is_whitespace()).collect();
    format!("#{}", escape_html(compact.trim_start_matches('#')))
}

/// Escape the characters significant to the channel's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
