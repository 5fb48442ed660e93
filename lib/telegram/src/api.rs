//! Telegram Bot API wire types.
//!
//! Only the fields the relay reads are modelled; unknown fields are ignored.

use crate::transport::{CallbackQuery, IncomingUpdate, UpdateKind};
use chat_relay_conversation::InboundMessage;
use chat_relay_core::ConversationId;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::warn;

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Payload on success.
    #[serde(default = "Option::default")]
    pub result: Option<T>,
    /// Human-readable error on failure.
    #[serde(default)]
    pub description: Option<String>,
    /// Error code on failure.
    #[serde(default)]
    pub error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<JsonValue>,
    #[serde(default)]
    pub callback_query: Option<RawCallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    fn identifier(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawCallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Parses a message payload, keeping the untouched JSON alongside.
fn inbound_message(raw: JsonValue) -> Option<InboundMessage> {
    let message: Message = match serde_json::from_value(raw.clone()) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed message payload");
            return None;
        }
    };

    Some(InboundMessage {
        conversation_id: ConversationId::new(message.chat.id),
        message_id: message.message_id,
        from: message.from.as_ref().map(User::identifier),
        text: message.text,
        raw,
    })
}

impl From<Update> for IncomingUpdate {
    fn from(update: Update) -> Self {
        let kind = if let Some(raw) = update.message {
            inbound_message(raw).map_or(UpdateKind::Other, UpdateKind::Message)
        } else if let Some(query) = update.callback_query {
            UpdateKind::Callback(CallbackQuery {
                id: query.id,
                from: query.from.identifier(),
                conversation_id: query
                    .message
                    .as_ref()
                    .map(|message| ConversationId::new(message.chat.id)),
                message_id: query.message.as_ref().map(|message| message.message_id),
                data: query.data,
            })
        } else {
            UpdateKind::Other
        };

        Self {
            update_id: update.update_id,
            kind,
        }
    }
}
