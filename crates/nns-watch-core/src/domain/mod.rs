//! # Domain Layer
//!
//! Pure state and rules, no I/O.
//!
//! ## Components
//!
//! - `entities`: SubscriberId, Topic (normalized), Proposal, limits
//! - `registry`: SubscriberRegistry with per-subscriber blocklists
//! - `watermark`: WatermarkTracker, the deduplication gate
//! - `snapshot`: Snapshot record and its JSON encoding
//! - `message`: Notification formatting
//! - `command`: Subscriber command parsing
//! - `errors`: Feed, snapshot and channel errors

pub mod command;
pub mod entities;
pub mod errors;
pub mod message;
pub mod registry;
pub mod snapshot;
pub mod watermark;

pub use command::*;
pub use entities::*;
pub use errors::*;
pub use message::*;
pub use registry::*;
pub use snapshot::*;
pub use watermark::*;
