//! Telegram Bot API adapter.
//!
//! One client serves both directions:
//!
//! - `sendMessage` for notifications and command replies (HTML, no link
//!   previews)
//! - `getUpdates` long-polling for inbound commands, with the offset
//!   advanced past every update seen
//!
//! A 403 (bot blocked, user deactivated) or a "chat not found" answer means
//! the recipient is gone for good; everything else is a transient failure.

use async_trait::async_trait;
use nns_watch_core::{
    ChannelError, CommandSource, DeliveryError, DeliveryOutcome, IncomingMessage, Notifier,
    SubscriberId,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// Extra time granted to a long-poll request beyond its server-side timeout.
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

/// Telegram Bot API client.
pub struct TelegramBot {
    client: Client,
    /// `<api>/bot<token>`
    endpoint: String,
    send_timeout: Duration,
    long_poll_timeout: Duration,
    /// Next `getUpdates` offset.
    offset: AtomicI64,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

impl TelegramBot {
    pub fn new(
        api_url: &str,
        token: &str,
        send_timeout: Duration,
        long_poll_timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            send_timeout,
            long_poll_timeout,
            offset: AtomicI64::new(0),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.endpoint, method)
    }

    /// Request-level `sendMessage` failure. The URL carries the token, so it
    /// is stripped from the message.
    fn send_error(&self, e: reqwest::Error) -> DeliveryError {
        if e.is_timeout() {
            DeliveryError::Timeout {
                after_ms: self.send_timeout.as_millis() as u64,
            }
        } else {
            DeliveryError::Transport(e.without_url().to_string())
        }
    }

    /// Offset the next `getUpdates` call will use.
    pub fn offset(&self) -> i64 {
        self.offset.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Notifier for TelegramBot {
    async fn notify(&self, recipient: SubscriberId, text: &str) -> DeliveryOutcome {
        let request = SendMessage {
            chat_id: recipient.0,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = match self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(self.send_timeout)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return DeliveryOutcome::Failed(self.send_error(e)),
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return DeliveryOutcome::Failed(self.send_error(e)),
        };

        let outcome = classify_send_response(status, &body);
        trace!(subscriber = %recipient, status, outcome = outcome.label(), "sendMessage");
        outcome
    }
}

#[async_trait]
impl CommandSource for TelegramBot {
    async fn next_messages(&self) -> Result<Vec<IncomingMessage>, ChannelError> {
        let request = GetUpdates {
            offset: self.offset(),
            timeout: self.long_poll_timeout.as_secs(),
            allowed_updates: ["message"],
        };

        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(self.long_poll_timeout + LONG_POLL_GRACE)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.without_url().to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| ChannelError::Transport(e.without_url().to_string()))?;

        let batch = parse_updates(&body)?;
        if let Some(next) = batch.next_offset {
            self.offset.fetch_max(next, Ordering::AcqRel);
        }
        debug!(messages = batch.messages.len(), offset = self.offset(), "Polled updates");
        Ok(batch.messages)
    }
}

/// Decoded `getUpdates` answer.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UpdateBatch {
    /// Text messages, in update order.
    pub messages: Vec<IncomingMessage>,
    /// Offset acknowledging every update in the batch, text or not.
    pub next_offset: Option<i64>,
}

/// Map a `sendMessage` answer to a delivery outcome.
pub fn classify_send_response(status: u16, body: &str) -> DeliveryOutcome {
    let parsed: Option<ApiResponse<serde_json::Value>> = serde_json::from_str(body).ok();

    if let Some(response) = &parsed {
        if response.ok {
            return DeliveryOutcome::Delivered;
        }
    } else if (200..300).contains(&status) {
        return DeliveryOutcome::Failed(DeliveryError::Api {
            code: status,
            description: "unparseable response".to_string(),
        });
    }

    let code = parsed.as_ref().and_then(|r| r.error_code).unwrap_or(status);
    let description = parsed
        .and_then(|r| r.description)
        .unwrap_or_else(|| format!("HTTP {status}"));

    if code == 403 || description.to_lowercase().contains("chat not found") {
        DeliveryOutcome::RecipientUnreachable
    } else {
        DeliveryOutcome::Failed(DeliveryError::Api { code, description })
    }
}

/// Decode a `getUpdates` answer, skipping updates that carry no text.
pub fn parse_updates(body: &str) -> Result<UpdateBatch, ChannelError> {
    let response: ApiResponse<Vec<Update>> =
        serde_json::from_str(body).map_err(|e| ChannelError::Parse(e.to_string()))?;

    if !response.ok {
        return Err(ChannelError::Api(
            response
                .description
                .unwrap_or_else(|| "getUpdates failed".to_string()),
        ));
    }

    let updates = response.result.unwrap_or_default();
    let next_offset = updates.iter().map(|u| u.update_id + 1).max();
    let messages = updates
        .into_iter()
        .filter_map(|update| {
            let message = update.message?;
            let text = message.text?;
            Some(IncomingMessage {
                sender: SubscriberId(message.chat.id),
                text,
            })
        })
        .collect();

    Ok(UpdateBatch {
        messages,
        next_offset,
    })
}
