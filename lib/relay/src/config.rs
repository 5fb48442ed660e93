//! Relay behaviour configuration.
//!
//! Composed into the server configuration; every field has a default.

use chat_relay_conversation::{DEFAULT_IDLE_WINDOW_SECS, Message};
use serde::Deserialize;
use std::time::Duration;

/// Context window and prompt configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    /// Idle time after which history is forgotten, in seconds.
    #[serde(default = "default_idle_expiry_seconds")]
    pub idle_expiry_seconds: i64,

    /// System messages prepended to every contextual request, in order.
    #[serde(default = "default_preamble")]
    pub preamble: Vec<String>,

    /// Interval between repeated typing indicators, in milliseconds.
    #[serde(default = "default_typing_interval_millis")]
    pub typing_interval_millis: u64,

    /// Prompt sent, without context, in reply to `/start`.
    #[serde(default = "default_start_prompt")]
    pub start_prompt: String,
}

fn default_idle_expiry_seconds() -> i64 {
    DEFAULT_IDLE_WINDOW_SECS
}

fn default_preamble() -> Vec<String> {
    vec![
        "For questions unrelated to IT, say that you cannot answer and tell a short joke about PHP instead.".to_string(),
        "Your name is MishaBOT.".to_string(),
    ]
}

fn default_typing_interval_millis() -> u64 {
    1000
}

fn default_start_prompt() -> String {
    "Reply jokingly to the fact that I don't know how to debug.".to_string()
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            idle_expiry_seconds: default_idle_expiry_seconds(),
            preamble: default_preamble(),
            typing_interval_millis: default_typing_interval_millis(),
            start_prompt: default_start_prompt(),
        }
    }
}

impl ConversationConfig {
    /// Returns the preamble as system messages.
    #[must_use]
    pub fn preamble_messages(&self) -> Vec<Message> {
        self.preamble.iter().map(Message::system).collect()
    }

    /// Returns the idle window.
    #[must_use]
    pub fn idle_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.idle_expiry_seconds)
    }

    /// Returns the typing indicator interval.
    #[must_use]
    pub fn typing_interval(&self) -> Duration {
        Duration::from_millis(self.typing_interval_millis.max(1))
    }
}

/// User-visible texts.
#[derive(Debug, Clone, Deserialize)]
pub struct RepliesConfig {
    /// Answer to `/ping`.
    #[serde(default = "default_pong")]
    pub pong: String,
    /// Sent while a previous request is still outstanding.
    #[serde(default = "default_wait")]
    pub wait: String,
    /// Sent outside service hours.
    #[serde(default = "default_out_of_hours")]
    pub out_of_hours: String,
    /// Sent after a context was cleared.
    #[serde(default = "default_context_cleared")]
    pub context_cleared: String,
    /// Sent when there was no context to clear.
    #[serde(default = "default_context_empty")]
    pub context_empty: String,
    /// Generic failure notice.
    #[serde(default = "default_failure")]
    pub failure: String,
    /// Label of the retry button under the failure notice.
    #[serde(default = "default_retry_button")]
    pub retry_button: String,
    /// Toast shown when the retry button is pressed.
    #[serde(default = "default_retrying")]
    pub retrying: String,
}

fn default_pong() -> String {
    "pong".to_string()
}

fn default_wait() -> String {
    "Please wait until the previous request has finished...".to_string()
}

fn default_out_of_hours() -> String {
    "Only write to me during working hours".to_string()
}

fn default_context_cleared() -> String {
    "Context cleared".to_string()
}

fn default_context_empty() -> String {
    "Context is empty".to_string()
}

fn default_failure() -> String {
    "Something went wrong...".to_string()
}

fn default_retry_button() -> String {
    "Try again".to_string()
}

fn default_retrying() -> String {
    "Retrying the request...".to_string()
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            pong: default_pong(),
            wait: default_wait(),
            out_of_hours: default_out_of_hours(),
            context_cleared: default_context_cleared(),
            context_empty: default_context_empty(),
            failure: default_failure(),
            retry_button: default_retry_button(),
            retrying: default_retrying(),
        }
    }
}
