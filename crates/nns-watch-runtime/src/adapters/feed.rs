//! Proposal feed over HTTP.

use async_trait::async_trait;
use nns_watch_core::{FeedError, Proposal, ProposalFeed};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Polls a URL that serves a JSON array of proposal records.
pub struct HttpProposalFeed {
    client: Client,
    url: String,
}

impl HttpProposalFeed {
    pub fn new(url: impl Into<String>) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ProposalFeed for HttpProposalFeed {
    async fn fetch(&self) -> Result<Vec<Proposal>, FeedError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        let proposals = parse_proposals(&body)?;
        debug!(count = proposals.len(), "Fetched proposals");
        Ok(proposals)
    }
}

/// Decode a feed response body.
pub fn parse_proposals(body: &[u8]) -> Result<Vec<Proposal>, FeedError> {
    serde_json::from_slice(body).map_err(|e| FeedError::Parse(e.to_string()))
}
