//! Chat transport for the chat-relay service.
//!
//! This crate provides:
//!
//! - **Transport traits**: Outbound operations and the inbound update feed
//! - **Telegram client**: Bot API implementation over HTTPS long polling

pub mod api;
pub mod client;
pub mod error;
pub mod transport;

pub use client::{TelegramClient, TelegramConfig};
pub use error::TransportError;
pub use transport::{
    BotCommand, CallbackQuery, ChatTransport, IncomingUpdate, InlineButton, InlineKeyboard,
    SendOptions, SentMessage, UpdateKind, UpdateSource,
};
