//! Error types for the telegram crate.

use std::fmt;

/// Errors from chat transport operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The HTTP request could not be completed.
    RequestFailed { method: String, reason: String },
    /// The Bot API answered with `ok: false`.
    ApiError {
        method: String,
        code: Option<i64>,
        description: String,
    },
    /// Response parsing failed.
    ResponseParseFailed { method: String, reason: String },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { method, reason } => {
                write!(f, "{method} request failed: {reason}")
            }
            Self::ApiError {
                method,
                code,
                description,
            } => match code {
                Some(code) => write!(f, "{method} rejected ({code}): {description}"),
                None => write!(f, "{method} rejected: {description}"),
            },
            Self::ResponseParseFailed { method, reason } => {
                write!(f, "failed to parse {method} response: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid transport configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for TransportError {}
