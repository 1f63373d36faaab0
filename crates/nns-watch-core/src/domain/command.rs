//! Subscriber command parsing.
//!
//! Commands are case-insensitive; the first whitespace-separated token is the
//! command and an `@BotName` suffix on it is ignored.

/// A parsed subscriber command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `/start`: subscribe, resetting the blocklist.
    Start,
    /// `/stop`: unsubscribe.
    Stop,
    /// `/block <topic>`
    Block(String),
    /// `/unblock <topic>`
    Unblock(String),
    /// `/block` or `/unblock` with the wrong number of arguments.
    MissingTopic(BlockVerb),
    /// `/blacklist`: show the blocklist.
    Blacklist,
    /// Anything else.
    Help,
}

/// Which blocklist command was malformed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockVerb {
    Block,
    Unblock,
}

impl BlockVerb {
    pub fn as_command(&self) -> &'static str {
        match self {
            Self::Block => "/block",
            Self::Unblock => "/unblock",
        }
    }
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let mut tokens = text.split_whitespace();
        let Some(head) = tokens.next() else {
            return Self::Help;
        };
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let args: Vec<&str> = tokens.collect();

        match name.as_str() {
            "/start" => Self::Start,
            "/stop" => Self::Stop,
            "/blacklist" => Self::Blacklist,
            "/block" => match args.as_slice() {
                [topic] => Self::Block((*topic).to_string()),
                _ => Self::MissingTopic(BlockVerb::Block),
            },
            "/unblock" => match args.as_slice() {
                [topic] => Self::Unblock((*topic).to_string()),
                _ => Self::MissingTopic(BlockVerb::Unblock),
            },
            _ => Self::Help,
        }
    }

    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Block(_) => "block",
            Self::Unblock(_) => "unblock",
            Self::MissingTopic(_) => "malformed",
            Self::Blacklist => "blacklist",
            Self::Help => "help",
        }
    }
}
