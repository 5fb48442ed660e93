//! Conversation state for the chat-relay service.
//!
//! This crate provides:
//!
//! - **Messages**: The closed `{role, content}` turn exchanged with the model
//! - **Inbound messages**: The raw shape of a message received from the chat platform
//! - **Context Store**: Per-conversation history, busy flag and idle expiry

pub mod context;
pub mod error;
pub mod inbound;
pub mod message;

pub use context::{BusyClaim, ContextStore, ConversationContext, DEFAULT_IDLE_WINDOW_SECS};
pub use error::ConversationError;
pub use inbound::InboundMessage;
pub use message::{Message, MessageRole};
