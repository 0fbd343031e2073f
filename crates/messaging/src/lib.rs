//! Chat transport for the assistant.
//!
//! - **Runner** (`runner`) - connect, receive, answer and reconnect with backoff
//! - **Commands** (`commands`) - `/start`, `/help`, `/clear` and outbound message limits
//! - **Telegram** (`telegram`) - Bot API long-polling transport
//!
//! ```text
//! Transport → MessagingRunner → commands | ConversationHandler (Coordinator) → Transport
//! ```

pub mod commands;
pub mod runner;
pub mod telegram;

pub use runner::{
    ConversationHandler, InboundMessage, MessagingRunner, MessagingTransport, NoopTransport,
    OutboundMessage, ReconnectPolicy, TransportError,
};
pub use telegram::TelegramTransport;
