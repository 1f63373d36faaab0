//! Subscriber command handling.
//!
//! | Command | Effect | Reply |
//! |---------|--------|-------|
//! | `/start` | subscribe, reset blocklist | confirmation + help |
//! | `/stop` | unsubscribe | confirmation |
//! | `/block <topic>` | add to blocklist | current blocklist |
//! | `/unblock <topic>` | remove from blocklist | current blocklist |
//! | `/blacklist` | none | current blocklist |
//! | anything else | none | help |

use crate::domain::{
    hashtag, BlockOutcome, BlockVerb, Command, SubscriberId, UnblockOutcome, MAX_BLOCKED_TOPICS,
    MAX_TOPIC_LENGTH,
};
use crate::ports::CommandApi;
use crate::service::WatchState;
use nns_watch_telemetry::{metric_inc, COMMANDS_HANDLED};
use std::sync::Arc;
use tracing::{debug, info};

pub const HELP_TEXT: &str = "I notify you about new NNS governance proposals.\n\n\
    /start - subscribe to proposals of all topics\n\
    /stop - unsubscribe\n\
    /block &lt;topic&gt; - mute a topic, e.g. /block Governance\n\
    /unblock &lt;topic&gt; - unmute a topic\n\
    /blacklist - list muted topics";

pub const SUBSCRIBED_TEXT: &str = "You are subscribed to new NNS proposals.";
pub const UNSUBSCRIBED_TEXT: &str = "You are unsubscribed. Send /start to subscribe again.";
pub const NOT_SUBSCRIBED_TEXT: &str = "You are not subscribed. Send /start first.";
pub const EMPTY_BLOCKLIST_TEXT: &str = "You receive proposals of all topics.";

/// Applies subscriber commands to the shared registry.
pub struct CommandHandler {
    state: Arc<WatchState>,
}

impl CommandHandler {
    pub fn new(state: Arc<WatchState>) -> Self {
        Self { state }
    }

    fn blocklist_reply(&self, subscriber: SubscriberId) -> String {
        match self.state.registry().blocked_topics(subscriber) {
            None => NOT_SUBSCRIBED_TEXT.to_string(),
            Some(topics) if topics.is_empty() => EMPTY_BLOCKLIST_TEXT.to_string(),
            Some(topics) => {
                let lines: Vec<String> = topics.iter().map(|t| hashtag(t)).collect();
                format!("Muted topics:\n{}", lines.join("\n"))
            }
        }
    }

    fn with_notice(&self, notice: &str, subscriber: SubscriberId) -> String {
        format!("{notice}\n\n{}", self.blocklist_reply(subscriber))
    }
}

impl CommandApi for CommandHandler {
    fn handle(&self, subscriber: SubscriberId, command: Command) -> String {
        metric_inc!(COMMANDS_HANDLED, &[command.label()]);
        debug!(subscriber = %subscriber, command = command.label(), "Handling command");

        let reply = match command {
            Command::Start => {
                let is_new = self.state.registry().subscribe(subscriber);
                info!(subscriber = %subscriber, is_new, "Subscribed");
                format!("{SUBSCRIBED_TEXT}\n\n{HELP_TEXT}")
            }
            Command::Stop => {
                if self.state.registry().unsubscribe(subscriber) {
                    info!(subscriber = %subscriber, "Unsubscribed");
                }
                UNSUBSCRIBED_TEXT.to_string()
            }
            Command::Block(topic) => match self.state.registry().block(subscriber, &topic) {
                BlockOutcome::NotSubscribed => NOT_SUBSCRIBED_TEXT.to_string(),
                BlockOutcome::Blocked | BlockOutcome::AlreadyBlocked => {
                    self.blocklist_reply(subscriber)
                }
                BlockOutcome::LimitReached => self.with_notice(
                    &format!("You can mute at most {MAX_BLOCKED_TOPICS} topics."),
                    subscriber,
                ),
                BlockOutcome::InvalidTopic => self.with_notice(
                    &format!("Topics must be 1 to {MAX_TOPIC_LENGTH} characters long."),
                    subscriber,
                ),
            },
            Command::Unblock(topic) => match self.state.registry().unblock(subscriber, &topic) {
                UnblockOutcome::NotSubscribed => NOT_SUBSCRIBED_TEXT.to_string(),
                UnblockOutcome::Unblocked | UnblockOutcome::NotBlocked => {
                    self.blocklist_reply(subscriber)
                }
            },
            Command::MissingTopic(verb) => missing_topic_text(verb),
            Command::Blacklist => self.blocklist_reply(subscriber),
            Command::Help => HELP_TEXT.to_string(),
        };

        self.state.refresh_gauges();
        reply
    }
}

fn missing_topic_text(verb: BlockVerb) -> String {
    format!(
        "Please specify one topic, e.g. {} Governance",
        verb.as_command()
    )
}
