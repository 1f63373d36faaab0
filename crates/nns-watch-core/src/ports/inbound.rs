//! Inbound (Driving) ports.

use crate::domain::{Command, SubscriberId};

/// Subscription management API driven by the chat channel.
pub trait CommandApi: Send + Sync {
    /// Apply `command` on behalf of `subscriber` and return the reply text.
    ///
    /// Never fails: malformed input yields a corrective reply and no mutation.
    fn handle(&self, subscriber: SubscriberId, command: Command) -> String;

    /// Parse raw message text and apply it.
    fn handle_text(&self, subscriber: SubscriberId, text: &str) -> String {
        self.handle(subscriber, Command::parse(text))
    }
}
