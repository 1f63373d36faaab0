//! # NNS Watch Core
//!
//! Subscription registry, proposal watermark and snapshot persistence for
//! the NNS proposal notifier.
//!
//! ## Purpose
//!
//! Tracks which chats want proposal notifications, which topics each chat
//! has muted, and the highest proposal id already announced. Every new
//! proposal is announced at most once per watermark lifetime, and only to
//! subscribers that haven't muted its topic.
//!
//! ## Domain Invariants
//!
//! | # | Invariant | Enforcement Location |
//! |---|-----------|---------------------|
//! | 1 | Watermark never decreases | `domain/watermark.rs` - `fetch_max` |
//! | 2 | A proposal is dispatched only after winning the watermark | `service/dispatcher.rs` - `process_batch()` |
//! | 3 | Batches are processed in ascending id order | `service/dispatcher.rs` - `sort_by_key` |
//! | 4 | At most 30 muted topics per subscriber | `domain/registry.rs` - `block()` |
//! | 5 | Topics are compared in normalized form | `domain/entities.rs` - `Topic::normalize()` |
//! | 6 | Unreachable recipients are unsubscribed | `service/dispatcher.rs`, `service/workers.rs` |
//! | 7 | Snapshots are replaced atomically | `adapters/file_store.rs` - temp file + rename |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/ - File and in-memory snapshot stores                 │
//! │  service/  - Dispatcher, command handler, workers               │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - CommandApi trait                           │
//! │  ports/outbound.rs - ProposalFeed, Notifier, CommandSource,     │
//! │                      SnapshotStore traits                       │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/entities.rs  - SubscriberId, Topic, Proposal            │
//! │  domain/registry.rs  - SubscriberRegistry, blocklists           │
//! │  domain/watermark.rs - WatermarkTracker                         │
//! │  domain/snapshot.rs  - Snapshot (JSON state file)               │
//! │  domain/message.rs   - MessageFormatter                         │
//! │  domain/command.rs   - Command parsing                          │
//! │  domain/errors.rs    - FeedError, SnapshotError, ChannelError   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The chat network and the proposal feed live behind the outbound ports;
//! their HTTP implementations are in `nns-watch-runtime`.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::*;
pub use domain::*;
pub use ports::*;
pub use service::*;
