//! OpenAI-compatible chat completion client.

use crate::backend::{CompletionProvider, CompletionResponse, TokenUsage};
use crate::error::LlmError;
use async_trait::async_trait;
use chat_relay_conversation::{Message, MessageRole};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Configuration for an OpenAI-compatible backend.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Optional organization id sent as `OpenAI-Organization`.
    #[serde(default)]
    pub organization: Option<String>,
    /// Base URL of the API, without the trailing `/chat/completions`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Upper bound on one completion call, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    120
}

impl OpenAiConfig {
    /// Creates a configuration with default endpoint and model.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            organization: None,
            base_url: default_base_url(),
            model: default_model(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }

    /// Points the client at another endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the organization id.
    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

/// Client for `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the HTTP client cannot be
    /// built.
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "api key is empty".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

/// Extracts the provider's error message from an error body.
fn parse_api_error(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Keeps the choices that carry content with a known role, in order.
fn into_messages(choices: Vec<Choice>) -> Vec<Message> {
    choices
        .into_iter()
        .filter_map(|choice| {
            let message = choice.message?;
            let content = message.content?;
            match message.role.parse::<MessageRole>() {
                Ok(role) => Some(Message::new(role, content)),
                Err(e) => {
                    warn!(error = %e, "Skipping choice with unknown role");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    #[instrument(skip(self, messages), fields(model = %self.config.model, message_count = messages.len()))]
    async fn complete(&self, messages: &[Message]) -> Result<CompletionResponse, LlmError> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
        };

        let mut builder = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request);
        if let Some(organization) = &self.config.organization {
            builder = builder.header("OpenAI-Organization", organization);
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message: parse_api_error(&body),
            });
        }

        let body: ChatCompletionBody =
            response
                .json()
                .await
                .map_err(|e| LlmError::ResponseParseFailed {
                    reason: e.to_string(),
                })?;

        let messages = into_messages(body.choices);
        debug!(choices = messages.len(), "Completion received");

        Ok(CompletionResponse {
            messages,
            usage: body.usage,
            model: body.model.unwrap_or_else(|| self.config.model.clone()),
        })
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
