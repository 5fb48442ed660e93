//! Start-up errors for the relay server.

use chat_relay_schedule::ScheduleError;
use std::fmt;

/// Configuration could not be loaded or is inconsistent.
#[derive(Debug)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    Load { details: String },
    /// The service hours settings are invalid.
    ServiceHours(ScheduleError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { details } => write!(f, "failed to load configuration: {details}"),
            Self::ServiceHours(e) => write!(f, "invalid service hours configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        Self::Load {
            details: e.to_string(),
        }
    }
}

impl From<ScheduleError> for ConfigError {
    fn from(e: ScheduleError) -> Self {
        Self::ServiceHours(e)
    }
}
