//! Telegram Bot API client.

use crate::api::{ApiResponse, Update, User};
use crate::error::TransportError;
use crate::transport::{
    BotCommand, ChatTransport, IncomingUpdate, InlineKeyboard, SendOptions, SentMessage,
    UpdateSource,
};
use async_trait::async_trait;
use chat_relay_core::ConversationId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

/// Extra time the HTTP client waits beyond the long-poll timeout.
const POLL_SLACK_SECS: u64 = 10;

/// Telegram connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by @BotFather.
    pub bot_token: String,

    /// Base URL of the Bot API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// How long one `getUpdates` call waits for new updates, in seconds.
    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: u64,
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_seconds() -> u64 {
    30
}

impl TelegramConfig {
    /// Creates a configuration for the hosted Bot API.
    #[must_use]
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base_url: default_api_base_url(),
            poll_timeout_seconds: default_poll_timeout_seconds(),
        }
    }

    /// Points the client at another Bot API server.
    #[must_use]
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    /// Sets the long-poll timeout.
    #[must_use]
    pub fn with_poll_timeout(mut self, seconds: u64) -> Self {
        self.poll_timeout_seconds = seconds;
        self
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Debug, Deserialize)]
struct SentMessageBody {
    message_id: i64,
}

/// HTTPS client for the Bot API.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the bot token is empty or the HTTP client cannot
    /// be built.
    pub fn new(config: TelegramConfig) -> Result<Self, TransportError> {
        if config.bot_token.trim().is_empty() {
            return Err(TransportError::InvalidConfig {
                reason: "bot token is empty".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                config.poll_timeout_seconds + POLL_SLACK_SECS,
            ))
            .build()
            .map_err(|e| TransportError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self { http, config })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    /// Invokes a Bot API method and unwraps the response envelope.
    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed {
                method: method.to_string(),
                reason: e.without_url().to_string(),
            })?;

        let envelope: ApiResponse<T> =
            response
                .json()
                .await
                .map_err(|e| TransportError::ResponseParseFailed {
                    method: method.to_string(),
                    reason: e.without_url().to_string(),
                })?;

        if !envelope.ok {
            return Err(TransportError::ApiError {
                method: method.to_string(),
                code: envelope.error_code,
                description: envelope.description.unwrap_or_default(),
            });
        }

        envelope
            .result
            .ok_or_else(|| TransportError::ResponseParseFailed {
                method: method.to_string(),
                reason: "missing result".to_string(),
            })
    }

    /// Returns the bot's username, verifying the token.
    #[instrument(skip(self))]
    pub async fn get_me(&self) -> Result<String, TransportError> {
        let me: User = self.call("getMe", &json!({})).await?;
        Ok(me.username.unwrap_or_else(|| me.id.to_string()))
    }

    /// Replaces the command menu shown by clients.
    #[instrument(skip(self, commands), fields(count = commands.len()))]
    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), TransportError> {
        let _: bool = self
            .call("setMyCommands", &json!({ "commands": commands }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    #[instrument(skip(self, text, options), fields(conversation_id = %conversation_id))]
    async fn send_text(
        &self,
        conversation_id: ConversationId,
        text: &str,
        options: SendOptions,
    ) -> Result<SentMessage, TransportError> {
        let request = SendMessageRequest {
            chat_id: conversation_id.get(),
            text,
            reply_markup: options.reply_markup.as_ref(),
        };
        let sent: SentMessageBody = self.call("sendMessage", &request).await?;
        Ok(SentMessage {
            conversation_id,
            message_id: sent.message_id,
        })
    }

    async fn send_typing_indicator(
        &self,
        conversation_id: ConversationId,
    ) -> Result<(), TransportError> {
        let _: bool = self
            .call(
                "sendChatAction",
                &json!({ "chat_id": conversation_id.get(), "action": "typing" }),
            )
            .await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    async fn clear_inline_keyboard(
        &self,
        conversation_id: ConversationId,
        message_id: i64,
    ) -> Result<(), TransportError> {
        // Returns the edited message, or `true` for inline messages.
        let _: serde_json::Value = self
            .call(
                "editMessageReplyMarkup",
                &json!({
                    "chat_id": conversation_id.get(),
                    "message_id": message_id,
                    "reply_markup": InlineKeyboard::default(),
                }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn next_updates(&self, offset: Option<i64>) -> Result<Vec<IncomingUpdate>, TransportError> {
        let mut body = json!({
            "timeout": self.config.poll_timeout_seconds,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        let updates: Vec<Update> = self.call("getUpdates", &body).await?;
        if !updates.is_empty() {
            debug!(count = updates.len(), "Received updates");
        }
        Ok(updates.into_iter().map(IncomingUpdate::from).collect())
    }
}
