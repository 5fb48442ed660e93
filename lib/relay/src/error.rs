//! Error types for the relay crate.
//!
//! `RelayError` is the orchestrator boundary: lower-level provider and
//! transport errors are lifted into it with `?` and reported with
//! rootcause.

use chat_relay_ai::LlmError;
use chat_relay_telegram::TransportError;
use std::fmt;

/// Errors that abort one orchestrated reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The completion provider failed.
    Completion(LlmError),
    /// The chat transport failed.
    Transport(TransportError),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completion(e) => write!(f, "completion failed: {e}"),
            Self::Transport(e) => write!(f, "transport failed: {e}"),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<LlmError> for RelayError {
    fn from(e: LlmError) -> Self {
        Self::Completion(e)
    }
}

impl From<TransportError> for RelayError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}
