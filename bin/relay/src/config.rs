//! Centralized server configuration.
//!
//! Loaded via the `config` crate from an optional `relay.{toml,yaml,json}`
//! file and environment variables, with `__` separating nested keys
//! (`TELEGRAM__BOT_TOKEN`, `SERVICE_HOURS__BYPASS`, ...). Environment
//! variables win over the file.

use crate::error::ConfigError;
use chat_relay_ai::OpenAiConfig;
use chat_relay_bot::{ConversationConfig, RepliesConfig};
use chat_relay_schedule::{ServiceHours, ServiceHoursConfig};
use chat_relay_telegram::TelegramConfig;
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use rootcause::prelude::Report;
use serde::Deserialize;

/// Separator for list values given through the environment.
///
/// Preamble messages are prose and routinely contain commas.
const ENV_LIST_SEPARATOR: &str = "|";

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Telegram Bot API connection.
    pub telegram: TelegramConfig,

    /// Completion API connection.
    pub openai: OpenAiConfig,

    /// IANA time zone used for service hours.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Operating hours.
    #[serde(default)]
    pub service_hours: ServiceHoursConfig,

    /// Context window and prompt settings.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// User-visible texts.
    #[serde(default)]
    pub replies: RepliesConfig,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl RelayConfig {
    /// Loads configuration from `relay.*` (if present) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, Report<ConfigError>> {
        Self::from_builder(
            config::Config::builder()
                .add_source(File::with_name("relay").required(false))
                .add_source(
                    Environment::default()
                        .separator("__")
                        .try_parsing(true)
                        .list_separator(ENV_LIST_SEPARATOR)
                        .with_list_parse_key("conversation.preamble"),
                ),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, Report<ConfigError>> {
        let config = builder
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Builds the operating-hours policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the time zone is unknown or the hour range is
    /// invalid.
    pub fn service_hours(&self) -> Result<ServiceHours, Report<ConfigError>> {
        let hours = ServiceHours::from_config(&self.timezone, &self.service_hours)
            .map_err(ConfigError::from)?;
        Ok(hours)
    }
}
