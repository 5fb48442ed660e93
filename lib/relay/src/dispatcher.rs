//! Routing of inbound messages and callbacks.
//!
//! Text is checked in a fixed order: `/ping`, service hours, the busy gate,
//! `/clear_context`, `/start`, and finally plain text forwarded with context.

use crate::config::RepliesConfig;
use crate::orchestrator::{HandleOutcome, RETRY_CALLBACK_DATA, ReplyOrchestrator};
use chat_relay_conversation::{ContextStore, InboundMessage};
use chat_relay_core::{Clock, ConversationId};
use chat_relay_schedule::ServiceHours;
use chat_relay_telegram::{BotCommand, CallbackQuery, ChatTransport, SendOptions};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Bot commands with fixed behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/ping`: liveness echo.
    Ping,
    /// `/clear_context`: forget the conversation.
    ClearContext,
    /// `/start`: canned prompt without context.
    Start,
}

impl Command {
    /// Parses a command from message text.
    ///
    /// Accepts the `/name@botname` form. Anything after the first word is
    /// ignored.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split_once('@').map_or(name, |(name, _)| name);

        match name {
            "ping" => Some(Self::Ping),
            "clear_context" => Some(Self::ClearContext),
            "start" => Some(Self::Start),
            _ => None,
        }
    }

    /// Returns the command name without the leading slash.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::ClearContext => "clear_context",
            Self::Start => "start",
        }
    }

    /// Returns the commands advertised to the chat platform.
    #[must_use]
    pub fn bot_commands() -> Vec<BotCommand> {
        [
            (Self::Start, "Start"),
            (Self::ClearContext, "Forget the conversation context"),
            (Self::Ping, "Ping"),
        ]
        .into_iter()
        .map(|(command, description)| BotCommand::new(command.name(), description))
        .collect()
    }
}

/// What the dispatcher did with an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No text; nothing happened.
    Ignored,
    /// Answered `/ping`.
    Pong,
    /// Rejected outside service hours.
    OutOfHours,
    /// Rejected because a request is outstanding.
    Busy,
    /// Handled `/clear_context`.
    ContextCleared {
        /// Whether a context existed.
        existed: bool,
    },
    /// Forwarded to the orchestrator.
    Handled(HandleOutcome),
}

/// Routes messages to fixed replies or the orchestrator.
pub struct CommandDispatcher {
    store: Arc<ContextStore>,
    orchestrator: Arc<ReplyOrchestrator>,
    transport: Arc<dyn ChatTransport>,
    hours: ServiceHours,
    clock: Arc<dyn Clock>,
    replies: RepliesConfig,
    start_prompt: String,
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("orchestrator", &self.orchestrator)
            .field("hours", &self.hours)
            .finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    /// Creates a dispatcher.
    pub fn new(
        store: Arc<ContextStore>,
        orchestrator: Arc<ReplyOrchestrator>,
        transport: Arc<dyn ChatTransport>,
        hours: ServiceHours,
        clock: Arc<dyn Clock>,
        replies: RepliesConfig,
        start_prompt: impl Into<String>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            transport,
            hours,
            clock,
            replies,
            start_prompt: start_prompt.into(),
        }
    }

    /// Dispatches one inbound message.
    #[instrument(skip(self, message), fields(conversation_id = %message.conversation_id))]
    pub async fn dispatch(&self, message: InboundMessage) -> DispatchOutcome {
        let Some(text) = message.text_body() else {
            return DispatchOutcome::Ignored;
        };
        let id = message.conversation_id;
        let command = Command::parse(text);

        if let Err(e) = self.transport.send_typing_indicator(id).await {
            debug!(error = %e, "Typing indicator failed");
        }

        if command == Some(Command::Ping) {
            self.reply(id, &self.replies.pong).await;
            return DispatchOutcome::Pong;
        }

        if !self.hours.is_within_service_hours(self.clock.now()) {
            self.reply(id, &self.replies.out_of_hours).await;
            return DispatchOutcome::OutOfHours;
        }

        if self.store.is_busy(id) {
            self.reply(id, &self.replies.wait).await;
            return DispatchOutcome::Busy;
        }

        let outcome = match command {
            Some(Command::ClearContext) => {
                let existed = self.store.clear(id);
                let text = if existed {
                    &self.replies.context_cleared
                } else {
                    &self.replies.context_empty
                };
                self.reply(id, text).await;
                return DispatchOutcome::ContextCleared { existed };
            }
            Some(Command::Start) => {
                self.orchestrator
                    .handle(&message, &self.start_prompt, false)
                    .await
            }
            _ => self.orchestrator.handle(&message, text, true).await,
        };

        if outcome == HandleOutcome::Busy {
            self.reply(id, &self.replies.wait).await;
            return DispatchOutcome::Busy;
        }
        DispatchOutcome::Handled(outcome)
    }

    /// Handles an inline button press.
    ///
    /// A `retry` press removes the button, acknowledges it and re-dispatches
    /// the conversation's failed input, if any. Returns the outcome of the
    /// re-dispatch.
    #[instrument(skip(self, query), fields(callback_id = %query.id, from = %query.from))]
    pub async fn handle_callback(&self, query: CallbackQuery) -> Option<DispatchOutcome> {
        if query.data.as_deref() != Some(RETRY_CALLBACK_DATA) {
            if let Err(e) = self.transport.answer_callback(&query.id, None).await {
                debug!(error = %e, "Failed to answer callback");
            }
            return None;
        }

        info!("Retrying");
        if let (Some(id), Some(message_id)) = (query.conversation_id, query.message_id) {
            if let Err(e) = self.transport.clear_inline_keyboard(id, message_id).await {
                debug!(error = %e, "Failed to remove retry button");
            }
        }
        if let Err(e) = self
            .transport
            .answer_callback(&query.id, Some(&self.replies.retrying))
            .await
        {
            debug!(error = %e, "Failed to answer callback");
        }

        let id = query.conversation_id?;
        let pending = self.store.take_pending_failed_input(id)?;
        let outcome = self.dispatch(pending.clone()).await;
        if matches!(outcome, DispatchOutcome::Busy | DispatchOutcome::OutOfHours) {
            self.store.set_pending_failed_input(id, pending);
        }
        Some(outcome)
    }

    async fn reply(&self, id: ConversationId, text: &str) {
        if let Err(e) = self.transport.send_text(id, text, SendOptions::default()).await {
            warn!(error = %e, "Failed to send reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversationConfig;
    use crate::testing::{RecordingTransport, ScriptedProvider};
    use chat_relay_ai::LlmError;
    use chat_relay_conversation::Message;
    use chat_relay_core::ManualClock;
    use chrono::{TimeZone, Utc};

    const CHAT: ConversationId = ConversationId::new(99);

    struct Fixture {
        store: Arc<ContextStore>,
        provider: Arc<ScriptedProvider>,
        transport: Arc<RecordingTransport>,
        clock: Arc<ManualClock>,
        dispatcher: Arc<CommandDispatcher>,
    }

    fn fixture_with(provider: ScriptedProvider, hours: ServiceHours) -> Fixture {
        // Tuesday, 10:00 UTC.
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
        ));
        let store = Arc::new(ContextStore::with_clock(
            chrono::Duration::minutes(15),
            clock.clone(),
        ));
        let provider = Arc::new(provider);
        let transport = Arc::new(RecordingTransport::default());
        let conversation = ConversationConfig::default();
        let orchestrator = Arc::new(ReplyOrchestrator::new(
            store.clone(),
            provider.clone(),
            transport.clone(),
            &conversation,
            RepliesConfig::default(),
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(
            store.clone(),
            orchestrator,
            transport.clone(),
            hours,
            clock.clone(),
            RepliesConfig::default(),
            conversation.start_prompt,
        ));
        Fixture {
            store,
            provider,
            transport,
            clock,
            dispatcher,
        }
    }

    fn fixture(provider: ScriptedProvider) -> Fixture {
        fixture_with(provider, ServiceHours::new("UTC", 8, 19).unwrap())
    }

    fn text(body: &str) -> InboundMessage {
        InboundMessage::text(CHAT, 10, body)
    }

    fn retry_query() -> CallbackQuery {
        CallbackQuery {
            id: "cb-1".to_string(),
            from: "alice".to_string(),
            conversation_id: Some(CHAT),
            message_id: Some(11),
            data: Some("retry".to_string()),
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("/ping"), Some(Command::Ping));
        assert_eq!(Command::parse("/start@misha_bot"), Some(Command::Start));
        assert_eq!(
            Command::parse("  /clear_context now"),
            Some(Command::ClearContext)
        );
        assert_eq!(Command::parse("ping"), None);
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn advertises_three_commands() {
        let names: Vec<_> = Command::bot_commands()
            .into_iter()
            .map(|c| c.command)
            .collect();
        assert_eq!(names, vec!["start", "clear_context", "ping"]);
    }

    #[tokio::test]
    async fn ping_answers_pong_without_completion() {
        let f = fixture(ScriptedProvider::default());

        let outcome = f.dispatcher.dispatch(text("/ping")).await;

        assert_eq!(outcome, DispatchOutcome::Pong);
        assert_eq!(f.transport.texts(CHAT), vec!["pong"]);
        assert!(f.provider.requests().is_empty());
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn ping_is_answered_out_of_hours() {
        let f = fixture(ScriptedProvider::default());
        f.clock.set(Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap());

        assert_eq!(f.dispatcher.dispatch(text("/ping")).await, DispatchOutcome::Pong);
    }

    #[tokio::test]
    async fn message_without_text_is_ignored() {
        let f = fixture(ScriptedProvider::default());
        let mut message = text("");
        message.text = None;

        assert_eq!(f.dispatcher.dispatch(message).await, DispatchOutcome::Ignored);
        assert!(f.transport.sent().is_empty());
        assert_eq!(f.transport.typing_count(CHAT), 0);
    }

    #[tokio::test]
    async fn text_message_sends_initial_typing() {
        let f = fixture(ScriptedProvider::replying(&["hi"]));

        f.dispatcher.dispatch(text("hello")).await;

        assert!(f.transport.typing_count(CHAT) >= 1);
    }

    #[tokio::test]
    async fn start_sends_canned_prompt_without_context() {
        let f = fixture(ScriptedProvider::replying(&["You debug with prayers."]));

        let outcome = f.dispatcher.dispatch(text("/start")).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Handled(HandleOutcome::Replied { count: 1 })
        );
        let requests = f.provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0],
            vec![Message::user(ConversationConfig::default().start_prompt)]
        );
        assert_eq!(f.transport.texts(CHAT), vec!["You debug with prayers."]);
        assert!(f.store.get(CHAT).history.is_empty());
    }

    #[tokio::test]
    async fn plain_text_is_forwarded_with_context() {
        let f = fixture(ScriptedProvider::replying(&["answer"]));

        f.dispatcher.dispatch(text("question")).await;

        assert_eq!(
            f.store.get(CHAT).history,
            vec![Message::user("question"), Message::assistant("answer")]
        );
    }

    #[tokio::test]
    async fn closed_on_saturday_and_at_night() {
        let f = fixture(ScriptedProvider::default());

        f.clock.set(Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap());
        assert_eq!(
            f.dispatcher.dispatch(text("hello")).await,
            DispatchOutcome::OutOfHours
        );

        f.clock.set(Utc.with_ymd_and_hms(2024, 3, 5, 3, 0, 0).unwrap());
        assert_eq!(
            f.dispatcher.dispatch(text("hello")).await,
            DispatchOutcome::OutOfHours
        );

        let out_of_hours = RepliesConfig::default().out_of_hours;
        assert_eq!(f.transport.texts(CHAT), vec![out_of_hours.clone(), out_of_hours]);
        assert!(f.provider.requests().is_empty());
    }

    #[tokio::test]
    async fn bypass_answers_on_weekends() {
        let hours = ServiceHours::new("UTC", 8, 19).unwrap().with_bypass(true);
        let f = fixture_with(ScriptedProvider::replying(&["sure"]), hours);
        f.clock.set(Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap());

        let outcome = f.dispatcher.dispatch(text("hello")).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Handled(HandleOutcome::Replied { count: 1 })
        );
    }

    #[tokio::test]
    async fn clear_context_reports_whether_anything_existed() {
        let f = fixture(ScriptedProvider::replying(&["answer"]));

        assert_eq!(
            f.dispatcher.dispatch(text("/clear_context")).await,
            DispatchOutcome::ContextCleared { existed: false }
        );

        f.dispatcher.dispatch(text("question")).await;
        assert_eq!(
            f.dispatcher.dispatch(text("/clear_context")).await,
            DispatchOutcome::ContextCleared { existed: true }
        );
        assert!(f.store.get(CHAT).history.is_empty());

        let texts = f.transport.texts(CHAT);
        assert_eq!(texts.first().map(String::as_str), Some("Context is empty"));
        assert_eq!(texts.last().map(String::as_str), Some("Context cleared"));
    }

    #[tokio::test]
    async fn concurrent_message_gets_wait_notice() {
        let (provider, gate) = ScriptedProvider::gated(&["slow answer"]);
        let f = fixture(provider);

        let first = {
            let dispatcher = f.dispatcher.clone();
            tokio::spawn(async move { dispatcher.dispatch(text("first")).await })
        };
        gate.entered().await;

        let second = f.dispatcher.dispatch(text("second")).await;
        assert_eq!(second, DispatchOutcome::Busy);
        assert!(f.store.get(CHAT).history.is_empty());
        assert_eq!(
            f.transport.texts(CHAT),
            vec![RepliesConfig::default().wait]
        );

        gate.release();
        assert_eq!(
            first.await.expect("join"),
            DispatchOutcome::Handled(HandleOutcome::Replied { count: 1 })
        );
        assert_eq!(f.store.get(CHAT).history.len(), 2);
    }

    #[tokio::test]
    async fn provider_failure_then_retry_succeeds() {
        let f = fixture(ScriptedProvider::failing(LlmError::RequestFailed {
            reason: "timeout".to_string(),
        }));

        let outcome = f.dispatcher.dispatch(text("question")).await;
        assert_eq!(outcome, DispatchOutcome::Handled(HandleOutcome::Failed));
        assert!(!f.store.is_busy(CHAT));
        assert_eq!(f.transport.texts(CHAT), vec!["Something went wrong..."]);

        let retried = f.dispatcher.handle_callback(retry_query()).await;

        assert_eq!(
            retried,
            Some(DispatchOutcome::Handled(HandleOutcome::Replied { count: 1 }))
        );
        assert_eq!(f.transport.cleared(), vec![(CHAT, 11)]);
        assert_eq!(
            f.transport.answered(),
            vec![("cb-1".to_string(), Some("Retrying the request...".to_string()))]
        );
        assert_eq!(
            f.store.get(CHAT).history,
            vec![Message::user("question"), Message::assistant("ok")]
        );
        assert!(f.store.take_pending_failed_input(CHAT).is_none());
    }

    #[tokio::test]
    async fn retry_without_pending_input_only_answers() {
        let f = fixture(ScriptedProvider::default());

        assert_eq!(f.dispatcher.handle_callback(retry_query()).await, None);
        assert_eq!(f.transport.answered().len(), 1);
        assert!(f.provider.requests().is_empty());
    }

    #[tokio::test]
    async fn retry_out_of_hours_keeps_pending_input() {
        let f = fixture(ScriptedProvider::failing(LlmError::RequestFailed {
            reason: "timeout".to_string(),
        }));
        f.dispatcher.dispatch(text("question")).await;
        f.clock.set(Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap());

        let retried = f.dispatcher.handle_callback(retry_query()).await;

        assert_eq!(retried, Some(DispatchOutcome::OutOfHours));
        assert_eq!(f.store.take_pending_failed_input(CHAT), Some(text("question")));
    }

    #[tokio::test]
    async fn unknown_callback_is_acknowledged_silently() {
        let f = fixture(ScriptedProvider::default());
        let mut query = retry_query();
        query.data = Some("other".to_string());

        assert_eq!(f.dispatcher.handle_callback(query).await, None);
        assert_eq!(f.transport.answered(), vec![("cb-1".to_string(), None)]);
        assert!(f.transport.cleared().is_empty());
    }
}
