//! In-memory collaborators for tests.

use async_trait::async_trait;
use chat_relay_ai::{CompletionProvider, CompletionResponse, LlmError};
use chat_relay_conversation::Message;
use chat_relay_core::ConversationId;
use chat_relay_telegram::{ChatTransport, SendOptions, SentMessage, TransportError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One recorded `send_text` call.
#[derive(Debug, Clone)]
pub struct SentText {
    pub conversation_id: ConversationId,
    pub text: String,
    pub options: SendOptions,
}

/// Transport that records every call.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentText>>,
    typing: Mutex<Vec<ConversationId>>,
    answered: Mutex<Vec<(String, Option<String>)>>,
    cleared: Mutex<Vec<(ConversationId, i64)>>,
    fail_sends: AtomicBool,
    next_message_id: AtomicI64,
    typing_gate: Option<Arc<Gate>>,
}

impl RecordingTransport {
    /// Transport whose typing calls park at the returned gate.
    pub fn parking_typing() -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        let transport = Self {
            typing_gate: Some(gate.clone()),
            ..Self::default()
        };
        (transport, gate)
    }

    /// Makes every subsequent `send_text` fail.
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentText> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self, id: ConversationId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|sent| sent.conversation_id == id)
            .map(|sent| sent.text)
            .collect()
    }

    pub fn typing_count(&self, id: ConversationId) -> usize {
        self.typing.lock().unwrap().iter().filter(|t| **t == id).count()
    }

    pub fn answered(&self) -> Vec<(String, Option<String>)> {
        self.answered.lock().unwrap().clone()
    }

    pub fn cleared(&self) -> Vec<(ConversationId, i64)> {
        self.cleared.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(
        &self,
        conversation_id: ConversationId,
        text: &str,
        options: SendOptions,
    ) -> Result<SentMessage, TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::RequestFailed {
                method: "sendMessage".to_string(),
                reason: "connection reset".to_string(),
            });
        }
        self.sent.lock().unwrap().push(SentText {
            conversation_id,
            text: text.to_string(),
            options,
        });
        Ok(SentMessage {
            conversation_id,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }

    async fn send_typing_indicator(
        &self,
        conversation_id: ConversationId,
    ) -> Result<(), TransportError> {
        self.typing.lock().unwrap().push(conversation_id);
        if let Some(gate) = &self.typing_gate {
            gate.park().await;
        }
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.answered
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }

    async fn clear_inline_keyboard(
        &self,
        conversation_id: ConversationId,
        message_id: i64,
    ) -> Result<(), TransportError> {
        self.cleared.lock().unwrap().push((conversation_id, message_id));
        Ok(())
    }
}

/// Holds a call open until released.
#[derive(Debug, Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    /// Waits until a call is parked at the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets the parked call continue.
    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn park(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

/// Provider replaying queued results; replies "ok" once the queue is empty.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    results: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
    gate: Option<Arc<Gate>>,
}

impl ScriptedProvider {
    pub fn replying(replies: &[&str]) -> Self {
        let provider = Self::default();
        provider.push_reply(replies);
        provider
    }

    pub fn failing(error: LlmError) -> Self {
        let provider = Self::default();
        provider.results.lock().unwrap().push_back(Err(error));
        provider
    }

    pub fn gated(replies: &[&str]) -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        let mut provider = Self::replying(replies);
        provider.gate = Some(gate.clone());
        (provider, gate)
    }

    pub fn push_reply(&self, replies: &[&str]) {
        let messages = replies.iter().map(|r| Message::assistant(*r)).collect();
        self.results
            .lock()
            .unwrap()
            .push_back(Ok(CompletionResponse::new("scripted", messages)));
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, messages: &[Message]) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(messages.to_vec());

        if let Some(gate) = &self.gate {
            gate.park().await;
        }

        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(CompletionResponse::new(
                    "scripted",
                    vec![Message::assistant("ok")],
                ))
            })
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
