//! Error types for the watch core.
//!
//! Each failure class is terminal where it is detected: callers log it and
//! carry on with the next proposal, recipient, or cycle.

use std::path::PathBuf;
use thiserror::Error;

/// Failures fetching or parsing the proposal feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed request failed: {0}")]
    Transport(String),

    #[error("Feed returned HTTP {status}")]
    Status { status: u16 },

    #[error("Feed response could not be parsed: {0}")]
    Parse(String),
}

/// Failures delivering one message to one recipient.
///
/// A recipient that is gone for good is not an error; it is reported as
/// `DeliveryOutcome::RecipientUnreachable`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Delivery request failed: {0}")]
    Transport(String),

    #[error("Delivery rejected with code {code}: {description}")]
    Api { code: u16, description: String },

    #[error("Delivery timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

/// Failures reading or writing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Snapshot is malformed: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Snapshot task failed: {0}")]
    Task(String),
}

impl SnapshotError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures receiving commands from the inbound channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel request failed: {0}")]
    Transport(String),

    #[error("Channel API rejected the request: {0}")]
    Api(String),

    #[error("Channel response could not be parsed: {0}")]
    Parse(String),
}
