//! Reply orchestration for one inbound text message.
//!
//! The orchestrator owns a single exchange with the completion provider:
//! it claims the conversation's busy flag, composes the prompt from the
//! context store, relays every returned choice to the chat and records the
//! round trip in history. Typing stops before the busy flag is released,
//! and only the request that claimed the flag releases it.

use crate::config::{ConversationConfig, RepliesConfig};
use crate::error::RelayError;
use crate::typing::TypingIndicator;
use chat_relay_ai::CompletionProvider;
use chat_relay_conversation::{BusyClaim, ContextStore, InboundMessage, Message};
use chat_relay_core::{ConversationId, RequestId};
use chat_relay_telegram::{
    ChatTransport, InlineButton, InlineKeyboard, SendOptions, SentMessage,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Callback data carried by the retry button under the failure notice.
pub const RETRY_CALLBACK_DATA: &str = "retry";

/// Result of [`ReplyOrchestrator::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The completion succeeded and this many replies were relayed.
    Replied {
        /// Number of replies returned by the provider.
        count: usize,
    },
    /// Another request for the conversation was already outstanding.
    Busy,
    /// The completion failed; the failure notice was sent.
    Failed,
}

/// Turns inbound text into completed replies.
pub struct ReplyOrchestrator {
    store: Arc<ContextStore>,
    provider: Arc<dyn CompletionProvider>,
    transport: Arc<dyn ChatTransport>,
    preamble: Vec<Message>,
    typing_interval: Duration,
    replies: RepliesConfig,
}

impl std::fmt::Debug for ReplyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyOrchestrator")
            .field("model", &self.provider.model())
            .field("preamble", &self.preamble.len())
            .field("typing_interval", &self.typing_interval)
            .finish_non_exhaustive()
    }
}

impl ReplyOrchestrator {
    /// Creates an orchestrator over shared collaborators.
    pub fn new(
        store: Arc<ContextStore>,
        provider: Arc<dyn CompletionProvider>,
        transport: Arc<dyn ChatTransport>,
        conversation: &ConversationConfig,
        replies: RepliesConfig,
    ) -> Self {
        Self {
            store,
            provider,
            transport,
            preamble: conversation.preamble_messages(),
            typing_interval: conversation.typing_interval(),
            replies,
        }
    }

    /// Handles one text message.
    ///
    /// With `use_context` the prompt is the preamble plus stored history and
    /// the exchange is persisted; without it only `text` is sent and nothing
    /// is recorded. Returns [`HandleOutcome::Busy`] without side effects when
    /// the conversation already has a request outstanding.
    #[instrument(
        skip(self, message, text),
        fields(conversation_id = %message.conversation_id, request_id = %RequestId::new())
    )]
    pub async fn handle(
        &self,
        message: &InboundMessage,
        text: &str,
        use_context: bool,
    ) -> HandleOutcome {
        let id = message.conversation_id;
        let Some(claim) = self.store.try_claim(id) else {
            return HandleOutcome::Busy;
        };

        info!("Typing started");
        let mut guard = BusyGuard {
            store: &self.store,
            id,
            claim,
            typing: Some(TypingIndicator::start(
                self.transport.clone(),
                id,
                self.typing_interval,
            )),
        };

        let result = self.exchange(id, text, use_context).await;
        guard.stop_typing().await;

        match result {
            Ok(exchange) => {
                let count = exchange.replies.len();
                if use_context {
                    // Clears busy, so nothing may await past this point.
                    self.store.append_all(
                        id,
                        std::iter::once(exchange.user_turn).chain(exchange.replies),
                    );
                }
                drop(guard);
                HandleOutcome::Replied { count }
            }
            Err(report) => {
                self.store.set_pending_failed_input(id, message.clone());
                drop(guard);
                warn!(error = %report, "Request failed");

                let options = SendOptions::with_keyboard(InlineKeyboard::single(
                    InlineButton::callback(&self.replies.retry_button, RETRY_CALLBACK_DATA),
                ));
                if let Err(e) = self.send(id, &self.replies.failure, options).await {
                    warn!(error = %e, "Failed to send failure notice");
                }
                HandleOutcome::Failed
            }
        }
    }

    async fn exchange(
        &self,
        id: ConversationId,
        text: &str,
        use_context: bool,
    ) -> chat_relay_core::Result<Exchange, RelayError> {
        let mut prompt = if use_context {
            self.store.build_prompt_messages(id, &self.preamble)
        } else {
            Vec::new()
        };
        let system_messages = prompt.iter().filter(|m| m.is_system()).count();
        info!(context_size = prompt.len(), system_messages, "Sending completion request");

        let user_turn = Message::user(text);
        prompt.push(user_turn.clone());

        let response = self
            .provider
            .complete(&prompt)
            .await
            .map_err(RelayError::from)?;

        if let Some(usage) = response.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Completion usage"
            );
        }

        for reply in &response.messages {
            if let Err(e) = self.send(id, &reply.content, SendOptions::default()).await {
                warn!(error = %e, "Failed to deliver reply");
            }
        }

        Ok(Exchange {
            user_turn,
            replies: response.messages,
        })
    }

    async fn send(
        &self,
        id: ConversationId,
        text: &str,
        options: SendOptions,
    ) -> chat_relay_core::Result<SentMessage, RelayError> {
        let sent = self
            .transport
            .send_text(id, text, options)
            .await
            .map_err(RelayError::from)?;
        Ok(sent)
    }
}

/// A completed round trip, relayed but not yet recorded.
struct Exchange {
    user_turn: Message,
    replies: Vec<Message>,
}

/// Stops typing and releases this request's busy claim when the exchange
/// ends.
struct BusyGuard<'a> {
    store: &'a ContextStore,
    id: ConversationId,
    claim: BusyClaim,
    typing: Option<TypingIndicator>,
}

impl BusyGuard<'_> {
    async fn stop_typing(&mut self) {
        if let Some(typing) = self.typing.take() {
            typing.stop().await;
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.store.release(self.id, self.claim);
    }
}
