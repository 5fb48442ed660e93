//! Context store for per-conversation history.
//!
//! Every conversation seen by the relay owns one [`ConversationContext`].
//! Contexts are created lazily on first reference and live for the lifetime
//! of the process; nothing is persisted.
//!
//! - History is reset, but the context kept, once the conversation has been
//!   idle for longer than the configured window.
//! - The busy flag allows at most one outstanding completion per
//!   conversation.
//! - The system preamble is prepended when building a prompt and is never
//!   stored in history.

use crate::inbound::InboundMessage;
use crate::message::Message;
use chat_relay_core::{Clock, ConversationId, SystemClock};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Canonical idle window after which history is forgotten: 15 minutes.
pub const DEFAULT_IDLE_WINDOW_SECS: i64 = 900;

/// Ownership of a conversation's busy flag.
///
/// Handed out by [`ContextStore::try_claim`]. Only the claim currently
/// holding the flag can release it through [`ContextStore::release`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyClaim(u64);

/// The state held for one conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationContext {
    /// True while a completion request for this conversation is outstanding.
    pub busy: bool,
    /// Refreshed whenever a message is appended.
    pub last_activity: DateTime<Utc>,
    /// Prior turns in insertion order.
    pub history: Vec<Message>,
    /// The inbound message of the last failed attempt, kept for a retry.
    pub pending_failed_input: Option<InboundMessage>,
    claim: Option<BusyClaim>,
}

impl ConversationContext {
    /// Creates an empty context last active at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            busy: false,
            last_activity: now,
            history: Vec::new(),
            pending_failed_input: None,
            claim: None,
        }
    }

    /// Returns true when the idle window has elapsed since the last append.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, idle_window: Duration) -> bool {
        now - self.last_activity > idle_window
    }

    fn set_idle(&mut self) {
        self.busy = false;
        self.claim = None;
    }
}

/// In-memory mapping from conversation id to its context.
///
/// All operations are total: a missing key reads as "not busy, empty
/// history". The inner lock is never held across an await point.
pub struct ContextStore {
    contexts: Mutex<HashMap<ConversationId, ConversationContext>>,
    idle_window: Duration,
    clock: Arc<dyn Clock>,
    next_claim: AtomicU64,
}

impl std::fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextStore")
            .field("conversations", &self.len())
            .field("idle_window", &self.idle_window)
            .finish()
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_IDLE_WINDOW_SECS))
    }
}

impl ContextStore {
    /// Creates a store driven by the system clock.
    #[must_use]
    pub fn new(idle_window: Duration) -> Self {
        Self::with_clock(idle_window, Arc::new(SystemClock))
    }

    /// Creates a store driven by the given clock.
    #[must_use]
    pub fn with_clock(idle_window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
            idle_window,
            clock,
            next_claim: AtomicU64::new(1),
        }
    }

    /// Returns the configured idle window.
    #[must_use]
    pub fn idle_window(&self) -> Duration {
        self.idle_window
    }

    fn contexts(&self) -> MutexGuard<'_, HashMap<ConversationId, ConversationContext>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a snapshot of the conversation's context, creating an empty
    /// one on first reference.
    pub fn get(&self, id: ConversationId) -> ConversationContext {
        let now = self.clock.now();
        self.contexts()
            .entry(id)
            .or_insert_with(|| ConversationContext::new(now))
            .clone()
    }

    /// Returns `preamble ++ history` after applying idle expiry.
    ///
    /// When the conversation has been idle past the window its history is
    /// discarded first, so only the preamble comes back.
    pub fn build_prompt_messages(&self, id: ConversationId, preamble: &[Message]) -> Vec<Message> {
        let now = self.clock.now();
        let mut contexts = self.contexts();
        let context = contexts
            .entry(id)
            .or_insert_with(|| ConversationContext::new(now));

        if !context.history.is_empty() && context.is_expired(now, self.idle_window) {
            debug!(
                conversation_id = %id,
                forgotten = context.history.len(),
                "Conversation idle, forgetting history"
            );
            context.history.clear();
        }

        preamble
            .iter()
            .chain(context.history.iter())
            .cloned()
            .collect()
    }

    /// Sets the busy flag. Clearing the flag of an unknown conversation is a
    /// no-op.
    ///
    /// Clearing drops any outstanding [`BusyClaim`].
    pub fn mark_busy(&self, id: ConversationId, flag: bool) {
        let now = self.clock.now();
        let mut contexts = self.contexts();
        if flag {
            contexts
                .entry(id)
                .or_insert_with(|| ConversationContext::new(now))
                .busy = true;
        } else if let Some(context) = contexts.get_mut(&id) {
            context.set_idle();
        }
    }

    /// Sets the busy flag if it is not already set and returns the claim
    /// that owns it.
    ///
    /// Returns `None`, leaving the context untouched, when another request
    /// already holds the conversation. Check and set happen under one lock.
    pub fn try_claim(&self, id: ConversationId) -> Option<BusyClaim> {
        let now = self.clock.now();
        let mut contexts = self.contexts();
        let context = contexts
            .entry(id)
            .or_insert_with(|| ConversationContext::new(now));
        if context.busy {
            return None;
        }
        let claim = BusyClaim(self.next_claim.fetch_add(1, Ordering::Relaxed));
        context.busy = true;
        context.claim = Some(claim);
        Some(claim)
    }

    /// Clears the busy flag if `claim` still holds it.
    ///
    /// Returns false when the flag was already cleared or has since been
    /// claimed by another request, whose flag is left alone.
    pub fn release(&self, id: ConversationId, claim: BusyClaim) -> bool {
        match self.contexts().get_mut(&id) {
            Some(context) if context.claim == Some(claim) => {
                context.set_idle();
                true
            }
            _ => false,
        }
    }

    /// Pushes a message to history, refreshes the activity timestamp and
    /// clears the busy flag.
    pub fn append(&self, id: ConversationId, message: Message) {
        self.append_all(id, [message]);
    }

    /// Pushes messages to history in order under a single lock, then
    /// refreshes the activity timestamp and clears the busy flag once.
    pub fn append_all(&self, id: ConversationId, messages: impl IntoIterator<Item = Message>) {
        let now = self.clock.now();
        let mut contexts = self.contexts();
        let context = contexts
            .entry(id)
            .or_insert_with(|| ConversationContext::new(now));
        context.history.extend(messages);
        context.last_activity = now;
        context.set_idle();
    }

    /// Removes the context entirely. Returns whether one existed.
    pub fn clear(&self, id: ConversationId) -> bool {
        let removed = self.contexts().remove(&id).is_some();
        if removed {
            info!(conversation_id = %id, "Clearing context");
        }
        removed
    }

    /// Returns the busy flag; unknown conversations are not busy.
    #[must_use]
    pub fn is_busy(&self, id: ConversationId) -> bool {
        self.contexts().get(&id).is_some_and(|context| context.busy)
    }

    /// Remembers the input of a failed attempt for a later retry.
    pub fn set_pending_failed_input(&self, id: ConversationId, message: InboundMessage) {
        let now = self.clock.now();
        self.contexts()
            .entry(id)
            .or_insert_with(|| ConversationContext::new(now))
            .pending_failed_input = Some(message);
    }

    /// Takes the retained failed input, if any.
    pub fn take_pending_failed_input(&self, id: ConversationId) -> Option<InboundMessage> {
        self.contexts()
            .get_mut(&id)
            .and_then(|context| context.pending_failed_input.take())
    }

    /// Returns the number of known conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts().len()
    }

    /// Returns true when no conversation has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts().is_empty()
    }
}
