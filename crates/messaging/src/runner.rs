use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use poolchat_agent::Coordinator;
use poolchat_core::domain::query::{Query, SessionId};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::{
    parse_command, truncate_message, BotCommand, CLEARED_TEXT, DEGRADED_REPLY, HELP_TEXT,
    MAX_MESSAGE_CHARS, UNKNOWN_COMMAND_TEXT, WELCOME_TEXT,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("another consumer holds the update stream: {0}")]
    Conflict(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: String,
    pub chat_id: String,
    pub session_id: SessionId,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: String,
    pub reply_to: Option<String>,
    pub text: String,
}

#[async_trait]
pub trait MessagingTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the stream closed cleanly.
    async fn next_message(&self) -> Result<Option<InboundMessage>, TransportError>;
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;

    async fn indicate_typing(&self, _chat_id: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl MessagingTransport for NoopTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_message(&self) -> Result<Option<InboundMessage>, TransportError> {
        Ok(None)
    }

    async fn send(&self, _message: &OutboundMessage) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Whatever answers free-text messages for a session.
#[async_trait]
pub trait ConversationHandler: Send + Sync {
    async fn respond(&self, session_id: &SessionId, text: &str) -> Result<String>;
    async fn reset(&self, session_id: &SessionId) -> bool;
}

#[async_trait]
impl ConversationHandler for Coordinator {
    async fn respond(&self, session_id: &SessionId, text: &str) -> Result<String> {
        let reply = self.handle(Query::new(session_id.clone(), text)).await;
        Ok(reply.text)
    }

    async fn reset(&self, session_id: &SessionId) -> bool {
        self.reset_session(session_id).await
    }
}

pub struct MessagingRunner {
    transport: Arc<dyn MessagingTransport>,
    handler: Arc<dyn ConversationHandler>,
    reconnect_policy: ReconnectPolicy,
}

impl MessagingRunner {
    pub fn new(
        transport: Arc<dyn MessagingTransport>,
        handler: Arc<dyn ConversationHandler>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, handler, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(TransportError::Conflict(detail)) => {
                    warn!(
                        event_name = "ingress.messaging.conflict",
                        detail = %detail,
                        "another bot instance is consuming updates; stopping this runner"
                    );
                    return Ok(());
                }
                Err(transport_error) => {
                    warn!(
                        event_name = "ingress.messaging.transport_failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "messaging transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "messaging retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening messaging transport connection");
        self.transport.connect().await?;
        info!(attempt, "messaging transport connected");

        loop {
            let Some(message) = self.transport.next_message().await? else {
                info!(attempt, "messaging transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            info!(
                event_name = "ingress.messaging.message_received",
                message_id = %message.message_id,
                correlation_id = %message.message_id,
                session_id = %message.session_id,
                "received chat message"
            );

            let Some(text) = self.answer(&message).await else {
                continue;
            };
            let outbound = OutboundMessage {
                chat_id: message.chat_id.clone(),
                reply_to: Some(message.message_id.clone()),
                text,
            };
            if let Err(error) = self.transport.send(&outbound).await {
                warn!(
                    event_name = "egress.messaging.send_failed",
                    message_id = %message.message_id,
                    correlation_id = %message.message_id,
                    session_id = %message.session_id,
                    error = %error,
                    "failed to deliver reply; continuing message loop"
                );
            } else {
                debug!(
                    event_name = "egress.messaging.reply_sent",
                    message_id = %message.message_id,
                    correlation_id = %message.message_id,
                    session_id = %message.session_id,
                    chars = outbound.text.chars().count(),
                    "reply delivered"
                );
            }
        }
    }

    /// The reply for one inbound message, already truncated. `None` for blank text.
    pub async fn answer(&self, message: &InboundMessage) -> Option<String> {
        if message.text.trim().is_empty() {
            return None;
        }

        let text = match parse_command(&message.text) {
            Some(BotCommand::Start) => WELCOME_TEXT.to_string(),
            Some(BotCommand::Help) => HELP_TEXT.to_string(),
            Some(BotCommand::Clear) => {
                let cleared = self.handler.reset(&message.session_id).await;
                info!(
                    event_name = "ingress.messaging.context_cleared",
                    session_id = %message.session_id,
                    cleared,
                    "conversation history cleared"
                );
                CLEARED_TEXT.to_string()
            }
            Some(BotCommand::Unknown(_)) => UNKNOWN_COMMAND_TEXT.to_string(),
            None => {
                if let Err(error) = self.transport.indicate_typing(&message.chat_id).await {
                    debug!(error = %error, "typing indicator failed");
                }
                match self.handler.respond(&message.session_id, &message.text).await {
                    Ok(reply) => reply,
                    Err(error) => {
                        warn!(
                            event_name = "ingress.messaging.handler_failed",
                            message_id = %message.message_id,
                            correlation_id = %message.message_id,
                            session_id = %message.session_id,
                            error = %error,
                            "message handling failed; sending degraded reply"
                        );
                        DEGRADED_REPLY.to_string()
                    }
                }
            }
        };

        Some(truncate_message(&text, MAX_MESSAGE_CHARS))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use poolchat_core::domain::query::SessionId;
    use tokio::sync::Mutex;

    use super::{
        ConversationHandler, InboundMessage, MessagingRunner, MessagingTransport, OutboundMessage,
        ReconnectPolicy, TransportError,
    };
    use crate::commands::{CLEARED_TEXT, DEGRADED_REPLY, MAX_MESSAGE_CHARS, WELCOME_TEXT};

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        inbound: VecDeque<Result<Option<InboundMessage>, TransportError>>,
        connect_attempts: usize,
        sent: Vec<OutboundMessage>,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            inbound: Vec<Result<Option<InboundMessage>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    inbound: inbound.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn sent(&self) -> Vec<OutboundMessage> {
            self.state.lock().await.sent.clone()
        }
    }

    #[async_trait]
    impl MessagingTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_message(&self) -> Result<Option<InboundMessage>, TransportError> {
            let mut state = self.state.lock().await;
            state.inbound.pop_front().unwrap_or(Ok(None))
        }

        async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
            self.state.lock().await.sent.push(message.clone());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            self.state.lock().await.disconnect_calls += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct EchoHandler {
        resets: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConversationHandler for EchoHandler {
        async fn respond(&self, _session_id: &SessionId, text: &str) -> Result<String> {
            if text == "explode" {
                bail!("coordinator unavailable");
            }
            if text == "long" {
                return Ok("x".repeat(MAX_MESSAGE_CHARS * 2));
            }
            Ok(format!("echo: {text}"))
        }

        async fn reset(&self, session_id: &SessionId) -> bool {
            self.resets.lock().expect("lock").push(session_id.to_string());
            true
        }
    }

    fn inbound(id: &str, text: &str) -> Result<Option<InboundMessage>, TransportError> {
        Ok(Some(InboundMessage {
            message_id: id.to_owned(),
            chat_id: "42".to_owned(),
            session_id: SessionId::new("telegram:42"),
            text: text.to_owned(),
        }))
    }

    fn no_delay(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![inbound("m-1", "price of LZA406103A"), Ok(None)],
        ));
        let runner =
            MessagingRunner::new(transport.clone(), Arc::new(EchoHandler::default()), no_delay(2));

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "echo: price of LZA406103A");
        assert_eq!(sent[0].reply_to.as_deref(), Some("m-1"));
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));
        let runner =
            MessagingRunner::new(transport.clone(), Arc::new(EchoHandler::default()), no_delay(2));

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn conflict_stops_without_reconnecting() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Conflict("terminated by other getUpdates".to_owned()))],
            vec![],
        ));
        let runner =
            MessagingRunner::new(transport.clone(), Arc::new(EchoHandler::default()), no_delay(3));

        runner.start().await.expect("conflict is not an error");
        assert_eq!(transport.connect_attempts().await, 1);
    }

    #[tokio::test]
    async fn commands_failures_and_long_replies() {
        let handler = Arc::new(EchoHandler::default());
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                inbound("m-1", "/start"),
                inbound("m-2", "/clear"),
                inbound("m-3", "explode"),
                inbound("m-4", "long"),
                inbound("m-5", "   "),
                Ok(None),
            ],
        ));
        let runner = MessagingRunner::new(transport.clone(), handler.clone(), no_delay(0));

        runner.start().await.expect("runner finishes");

        let sent = transport.sent().await;
        let texts = sent.iter().map(|message| message.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts.len(), 4, "blank messages get no reply");
        assert_eq!(texts[0], WELCOME_TEXT);
        assert_eq!(texts[1], CLEARED_TEXT);
        assert_eq!(texts[2], DEGRADED_REPLY);
        assert_eq!(texts[3].chars().count(), MAX_MESSAGE_CHARS);
        assert!(texts[3].ends_with("..."));
        assert_eq!(*handler.resets.lock().expect("lock"), vec!["telegram:42"]);
    }
}
