//! Relay engine for the chat-relay service.
//!
//! This crate ties the context store, completion provider and chat
//! transport together:
//!
//! - **Orchestrator**: one prompt/complete/reply exchange per message, single-flight per conversation
//! - **Dispatcher**: command routing, service-hours and busy gates, the retry button
//! - **Typing**: cancellable repeating typing indicator
//! - **Poller**: long-polling loop handing updates to the dispatcher

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod typing;

#[cfg(test)]
mod testing;

pub use config::{ConversationConfig, RepliesConfig};
pub use dispatcher::{Command, CommandDispatcher, DispatchOutcome};
pub use error::RelayError;
pub use orchestrator::{HandleOutcome, RETRY_CALLBACK_DATA, ReplyOrchestrator};
pub use poller::{POLL_ERROR_BACKOFF, run_polling};
pub use typing::TypingIndicator;
