//! HTTP implementations of the watch core's outbound ports.
//!
//! - `feed`: `ProposalFeed` over the public proposal endpoint
//! - `telegram`: `Notifier` and `CommandSource` over the Telegram Bot API

pub mod feed;
pub mod telegram;

pub use feed::HttpProposalFeed;
pub use telegram::TelegramBot;
