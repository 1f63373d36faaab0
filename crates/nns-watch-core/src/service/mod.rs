//! # Service Layer
//!
//! Wires the domain to the ports:
//!
//! - `state`: WatchState, the shared registry + watermark
//! - `dispatcher`: NotificationDispatcher (watermark gate and fan-out)
//! - `commands`: CommandHandler implementing the inbound `CommandApi`
//! - `workers`: poll, persistence and command loops

pub mod commands;
pub mod dispatcher;
pub mod state;
pub mod workers;

pub use commands::*;
pub use dispatcher::*;
pub use state::*;
pub use workers::*;
