//! Transport traits and related types.
//!
//! The relay talks to the chat platform only through these traits, so the
//! orchestration logic can be exercised without a network.

use crate::error::TransportError;
use async_trait::async_trait;
use chat_relay_conversation::InboundMessage;
use chat_relay_core::ConversationId;
use serde::{Deserialize, Serialize};

/// One button of an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    /// Label shown to the user.
    pub text: String,
    /// Opaque payload delivered back in the callback query.
    pub callback_data: String,
}

impl InlineButton {
    /// Creates a callback button.
    #[must_use]
    pub fn callback(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Buttons attached below a message, row by row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    /// Keyboard rows.
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// Creates a keyboard with a single button.
    #[must_use]
    pub fn single(button: InlineButton) -> Self {
        Self {
            inline_keyboard: vec![vec![button]],
        }
    }
}

/// Options for an outgoing text message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Inline keyboard to attach.
    pub reply_markup: Option<InlineKeyboard>,
}

impl SendOptions {
    /// Attaches an inline keyboard.
    #[must_use]
    pub fn with_keyboard(keyboard: InlineKeyboard) -> Self {
        Self {
            reply_markup: Some(keyboard),
        }
    }
}

/// Identifies a message the transport delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    /// The conversation the message went to.
    pub conversation_id: ConversationId,
    /// Platform message id.
    pub message_id: i64,
}

/// A press on an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackQuery {
    /// Id used to answer the query.
    pub id: String,
    /// Identifier of the user who pressed the button.
    pub from: String,
    /// Conversation of the message carrying the button, if still available.
    pub conversation_id: Option<ConversationId>,
    /// Id of the message carrying the button.
    pub message_id: Option<i64>,
    /// The button's callback data.
    pub data: Option<String>,
}

/// What an update carries.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    /// A new message in a conversation.
    Message(InboundMessage),
    /// An inline button press.
    Callback(CallbackQuery),
    /// Anything the relay does not handle.
    Other,
}

/// One update from the platform feed.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingUpdate {
    /// Monotonic update id used to acknowledge the feed.
    pub update_id: i64,
    /// Update payload.
    pub kind: UpdateKind,
}

/// A command advertised in the client's command menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotCommand {
    /// Command name without the leading slash.
    pub command: String,
    /// Short description.
    pub description: String,
}

impl BotCommand {
    /// Creates a command entry.
    #[must_use]
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}

/// Outbound chat operations.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends a text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses or the request fails.
    async fn send_text(
        &self,
        conversation_id: ConversationId,
        text: &str,
        options: SendOptions,
    ) -> Result<SentMessage, TransportError>;

    /// Shows the "typing" status in the conversation for a few seconds.
    async fn send_typing_indicator(
        &self,
        conversation_id: ConversationId,
    ) -> Result<(), TransportError>;

    /// Answers a callback query, optionally with a short toast.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Removes the inline keyboard from a sent message.
    async fn clear_inline_keyboard(
        &self,
        conversation_id: ConversationId,
        message_id: i64,
    ) -> Result<(), TransportError>;
}

/// Inbound update feed.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Waits for the next batch of updates with id at or above `offset`.
    ///
    /// Passing an offset acknowledges every earlier update.
    async fn next_updates(&self, offset: Option<i64>) -> Result<Vec<IncomingUpdate>, TransportError>;
}
