//! chat-relay server.
//!
//! Configuration and wiring for the Telegram relay process.

pub mod config;
pub mod error;
