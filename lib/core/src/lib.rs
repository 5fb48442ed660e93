//! Core domain types and utilities for the chat-relay service.
//!
//! This crate provides the foundational types, error handling, and the
//! clock abstraction shared by every other chat-relay crate.

pub mod clock;
pub mod error;
pub mod id;

#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};
pub use error::Result;
pub use id::{ConversationId, ParseIdError, RequestId};
