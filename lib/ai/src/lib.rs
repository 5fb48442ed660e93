//! Chat completion for the chat-relay service.
//!
//! This crate provides:
//!
//! - **Completion Provider**: The seam the reply orchestrator calls with an
//!   ordered list of messages
//! - **OpenAI client**: A provider for OpenAI-compatible chat completion APIs

pub mod backend;
pub mod error;
pub mod openai;

pub use backend::{CompletionProvider, CompletionResponse, TokenUsage};
pub use error::LlmError;
pub use openai::{OpenAiClient, OpenAiConfig};
