//! Error types for the conversation crate.
//!
//! The context store itself is total over its mapping and never fails;
//! these errors come from interpreting data that crosses the crate boundary.

use std::fmt;

/// Conversation-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// A role string outside `system`, `user` and `assistant`.
    UnknownRole { role: String },
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRole { role } => write!(f, "unknown message role: {role}"),
        }
    }
}

impl std::error::Error for ConversationError {}
