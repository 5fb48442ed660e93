//! Completion provider abstraction.
//!
//! Provides a unified interface over hosted chat completion APIs.

use crate::error::LlmError;
use async_trait::async_trait;
use chat_relay_conversation::Message;
use serde::{Deserialize, Serialize};

/// The outcome of one completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    /// Generated messages in choice order. May be empty.
    pub messages: Vec<Message>,
    /// Token usage statistics, when the provider reports them.
    pub usage: Option<TokenUsage>,
    /// Model that generated the response.
    pub model: String,
}

impl CompletionResponse {
    /// Creates a response carrying the given messages.
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            messages,
            usage: None,
            model: model.into(),
        }
    }

    /// Attaches token usage.
    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of prompt tokens.
    pub prompt_tokens: u32,
    /// Number of generated tokens.
    pub completion_tokens: u32,
    /// Total tokens billed.
    pub total_tokens: u32,
}

/// Trait for completion providers.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generates replies for the ordered message list.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails; provider-side failures carry the
    /// provider's human-readable message.
    async fn complete(&self, messages: &[Message]) -> Result<CompletionResponse, LlmError>;

    /// Returns the model name.
    fn model(&self) -> &str;
}
