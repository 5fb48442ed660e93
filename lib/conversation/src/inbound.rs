//! Inbound messages received from the chat platform.

use chat_relay_core::ConversationId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A message as delivered by the chat transport.
///
/// The untouched platform payload is kept in `raw` so a failed turn can be
/// replayed exactly as it arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Platform message id within the conversation.
    pub message_id: i64,
    /// Identifier of the sender, if the platform exposes one.
    pub from: Option<String>,
    /// Text body. `None` for stickers, photos and other non-text content.
    pub text: Option<String>,
    /// The original platform payload.
    #[serde(default)]
    pub raw: JsonValue,
}

impl InboundMessage {
    /// Creates a text message without a raw payload.
    #[must_use]
    pub fn text(conversation_id: ConversationId, message_id: i64, text: impl Into<String>) -> Self {
        Self {
            conversation_id,
            message_id,
            from: None,
            text: Some(text.into()),
            raw: JsonValue::Null,
        }
    }

    /// Sets the sender identifier.
    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Attaches the raw platform payload.
    #[must_use]
    pub fn with_raw(mut self, raw: JsonValue) -> Self {
        self.raw = raw;
        self
    }

    /// Returns the text body, treating empty text as absent.
    #[must_use]
    pub fn text_body(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }
}
