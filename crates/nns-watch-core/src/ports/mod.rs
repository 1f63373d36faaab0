//! Ports layer.
//!
//! - Inbound (Driving) ports: the command API exposed to the chat channel
//! - Outbound (Driven) ports: feed, delivery, inbound messages, durable storage

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
