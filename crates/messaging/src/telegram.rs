//! Telegram Bot API over long polling.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use poolchat_core::config::TelegramConfig;
use poolchat_core::domain::query::SessionId;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::runner::{InboundMessage, MessagingTransport, OutboundMessage, TransportError};

const SESSION_PREFIX: &str = "telegram";
const HTTP_CONFLICT: i64 = 409;

#[derive(Debug, Deserialize)]
struct BotApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SendChatAction<'a> {
    chat_id: &'a str,
    action: &'static str,
}

/// Text messages only; stickers, photos and edits are skipped.
pub fn inbound_from_update(update: Update) -> Option<InboundMessage> {
    let message = update.message?;
    let text = message.text?;
    let chat_id = message.chat.id.to_string();
    Some(InboundMessage {
        message_id: message.message_id.to_string(),
        session_id: SessionId::new(format!("{SESSION_PREFIX}:{chat_id}")),
        chat_id,
        text,
    })
}

#[derive(Default)]
struct PollState {
    offset: i64,
    pending: VecDeque<InboundMessage>,
}

pub struct TelegramTransport {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: SecretString,
    poll_timeout_secs: u64,
    state: Mutex<PollState>,
}

impl TelegramTransport {
    pub fn new(config: &TelegramConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
            state: Mutex::new(PollState::default()),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url, self.bot_token.expose_secret())
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|error| TransportError::Receive(format!("{method}: {}", redact(&error))))?;

        let parsed: BotApiResponse<T> = response
            .json()
            .await
            .map_err(|error| TransportError::Receive(format!("{method}: {}", redact(&error))))?;

        if !parsed.ok {
            let description = parsed.description.unwrap_or_else(|| "unknown error".to_string());
            if parsed.error_code == Some(HTTP_CONFLICT) {
                return Err(TransportError::Conflict(description));
            }
            return Err(TransportError::Receive(format!("{method}: {description}")));
        }
        parsed
            .result
            .ok_or_else(|| TransportError::Receive(format!("{method}: response had no result")))
    }
}

/// reqwest errors carry the URL, which carries the bot token.
fn redact(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    if let Some(url) = error.url() {
        message = message.replace(url.as_str(), "<telegram api>");
    }
    message
}

#[async_trait]
impl MessagingTransport for TelegramTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let me: BotUser = self
            .call("getMe", &serde_json::json!({}))
            .await
            .map_err(|error| match error {
                TransportError::Receive(detail) => TransportError::Connect(detail),
                other => other,
            })?;
        tracing::info!(
            event_name = "ingress.telegram.connected",
            bot = me.username.as_deref().unwrap_or("unknown"),
            "telegram bot authenticated"
        );
        Ok(())
    }

    async fn next_message(&self) -> Result<Option<InboundMessage>, TransportError> {
        let mut state = self.state.lock().await;
        loop {
            if let Some(message) = state.pending.pop_front() {
                return Ok(Some(message));
            }

            let request = GetUpdates {
                offset: state.offset,
                timeout: self.poll_timeout_secs,
                allowed_updates: ["message"],
            };
            let updates: Vec<Update> = self.call("getUpdates", &request).await?;
            tracing::debug!(
                event_name = "ingress.telegram.polled",
                offset = state.offset,
                updates = updates.len(),
                "telegram poll returned"
            );
            for update in updates {
                state.offset = state.offset.max(update.update_id + 1);
                if let Some(message) = inbound_from_update(update) {
                    state.pending.push_back(message);
                }
            }
        }
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let body = SendMessage {
            chat_id: &message.chat_id,
            text: &message.text,
            reply_to_message_id: message.reply_to.as_deref().and_then(|id| id.parse().ok()),
        };
        let _: serde_json::Value =
            self.call("sendMessage", &body).await.map_err(|error| match error {
                TransportError::Receive(detail) => TransportError::Send(detail),
                other => other,
            })?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn indicate_typing(&self, chat_id: &str) -> Result<(), TransportError> {
        let body = SendChatAction { chat_id, action: "typing" };
        let _: bool = self.call("sendChatAction", &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{inbound_from_update, Update};

    #[test]
    fn text_updates_become_session_messages() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 7,
            "message": {
                "message_id": 55,
                "chat": {"id": 123456, "type": "private"},
                "from": {"id": 9, "first_name": "Sam"},
                "text": "price of LZA406103A"
            }
        }))
        .expect("update parses");

        let inbound = inbound_from_update(update).expect("text message");
        assert_eq!(inbound.chat_id, "123456");
        assert_eq!(inbound.message_id, "55");
        assert_eq!(inbound.session_id.as_str(), "telegram:123456");
        assert_eq!(inbound.text, "price of LZA406103A");
    }

    #[test]
    fn non_text_updates_are_skipped() {
        let sticker: Update = serde_json::from_value(serde_json::json!({
            "update_id": 8,
            "message": {"message_id": 56, "chat": {"id": 1}, "sticker": {"file_id": "x"}}
        }))
        .expect("update parses");
        let edit: Update = serde_json::from_value(serde_json::json!({
            "update_id": 9,
            "edited_message": {"message_id": 57, "chat": {"id": 1}, "text": "typo"}
        }))
        .expect("update parses");

        assert!(inbound_from_update(sticker).is_none());
        assert!(inbound_from_update(edit).is_none());
    }
}
