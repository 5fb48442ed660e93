//! Long-polling loop feeding updates to the dispatcher.

use crate::dispatcher::CommandDispatcher;
use chat_relay_telegram::{IncomingUpdate, UpdateKind, UpdateSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay before polling again after a failed poll.
pub const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Polls `source` until `shutdown` is cancelled.
///
/// Every update is handled on its own task so conversations proceed
/// independently. In-flight handlers are awaited before returning.
pub async fn run_polling(
    source: Arc<dyn UpdateSource>,
    dispatcher: Arc<CommandDispatcher>,
    shutdown: CancellationToken,
) {
    let mut offset: Option<i64> = None;
    let mut handlers = JoinSet::new();

    info!("Polling for updates");
    loop {
        let polled = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            polled = source.next_updates(offset) => polled,
        };

        match polled {
            Ok(updates) => {
                for update in updates {
                    let next = update.update_id + 1;
                    offset = Some(offset.map_or(next, |o| o.max(next)));
                    let dispatcher = dispatcher.clone();
                    handlers.spawn(handle_update(dispatcher, update));
                }
            }
            Err(e) => {
                warn!(error = %e, "Polling failed");
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                }
            }
        }

        while let Some(joined) = handlers.try_join_next() {
            if let Err(e) = joined {
                error!(error = %e, "Update handler panicked");
            }
        }
    }

    info!(in_flight = handlers.len(), "Polling stopped, waiting for handlers");
    while let Some(joined) = handlers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Update handler panicked");
        }
    }
}

async fn handle_update(dispatcher: Arc<CommandDispatcher>, update: IncomingUpdate) {
    match update.kind {
        UpdateKind::Message(message) => {
            let outcome = dispatcher.dispatch(message).await;
            debug!(update_id = update.update_id, ?outcome, "Message handled");
        }
        UpdateKind::Callback(query) => {
            let outcome = dispatcher.handle_callback(query).await;
            debug!(update_id = update.update_id, ?outcome, "Callback handled");
        }
        UpdateKind::Other => {
            debug!(update_id = update.update_id, "Ignoring update");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConversationConfig, RepliesConfig};
    use crate::orchestrator::ReplyOrchestrator;
    use crate::testing::{RecordingTransport, ScriptedProvider};
    use async_trait::async_trait;
    use chat_relay_conversation::{ContextStore, InboundMessage};
    use chat_relay_core::ConversationId;
    use chat_relay_schedule::ServiceHours;
    use chat_relay_telegram::TransportError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays batches, then waits until cancelled.
    #[derive(Default)]
    struct FakeSource {
        batches: Mutex<VecDeque<Result<Vec<IncomingUpdate>, TransportError>>>,
        offsets: Mutex<Vec<Option<i64>>>,
    }

    #[async_trait]
    impl UpdateSource for FakeSource {
        async fn next_updates(
            &self,
            offset: Option<i64>,
        ) -> Result<Vec<IncomingUpdate>, TransportError> {
            self.offsets.lock().unwrap().push(offset);
            let next = self.batches.lock().unwrap().pop_front();
            match next {
                Some(batch) => batch,
                None => std::future::pending().await,
            }
        }
    }

    fn dispatcher(transport: Arc<RecordingTransport>) -> Arc<CommandDispatcher> {
        let store = Arc::new(ContextStore::default());
        let orchestrator = Arc::new(ReplyOrchestrator::new(
            store.clone(),
            Arc::new(ScriptedProvider::default()),
            transport.clone(),
            &ConversationConfig::default(),
            RepliesConfig::default(),
        ));
        Arc::new(CommandDispatcher::new(
            store,
            orchestrator,
            transport,
            ServiceHours::new("UTC", 0, 23).unwrap().with_bypass(true),
            Arc::new(chat_relay_core::SystemClock),
            RepliesConfig::default(),
            "start",
        ))
    }

    fn ping(update_id: i64, chat: i64) -> IncomingUpdate {
        IncomingUpdate {
            update_id,
            kind: UpdateKind::Message(InboundMessage::text(
                ConversationId::new(chat),
                update_id,
                "/ping",
            )),
        }
    }

    #[tokio::test]
    async fn advances_offset_and_dispatches_updates() {
        let transport = Arc::new(RecordingTransport::default());
        let source = Arc::new(FakeSource::default());
        source
            .batches
            .lock()
            .unwrap()
            .extend([Ok(vec![ping(5, 1), ping(6, 2)]), Ok(vec![IncomingUpdate {
                update_id: 7,
                kind: UpdateKind::Other,
            }])]);

        let shutdown = CancellationToken::new();
        let poller = tokio::spawn(run_polling(
            source.clone(),
            dispatcher(transport.clone()),
            shutdown.clone(),
        ));

        while source.offsets.lock().unwrap().len() < 3 {
            tokio::task::yield_now().await;
        }
        shutdown.cancel();
        poller.await.expect("join");

        assert_eq!(
            *source.offsets.lock().unwrap(),
            vec![None, Some(7), Some(8)]
        );
        assert_eq!(transport.texts(ConversationId::new(1)), vec!["pong"]);
        assert_eq!(transport.texts(ConversationId::new(2)), vec!["pong"]);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_polling_after_errors() {
        let transport = Arc::new(RecordingTransport::default());
        let source = Arc::new(FakeSource::default());
        source.batches.lock().unwrap().extend([
            Err(TransportError::RequestFailed {
                method: "getUpdates".to_string(),
                reason: "connection refused".to_string(),
            }),
            Ok(vec![ping(1, 3)]),
        ]);

        let shutdown = CancellationToken::new();
        let poller = tokio::spawn(run_polling(
            source.clone(),
            dispatcher(transport.clone()),
            shutdown.clone(),
        ));

        while source.offsets.lock().unwrap().len() < 3 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        shutdown.cancel();
        poller.await.expect("join");

        assert_eq!(
            *source.offsets.lock().unwrap(),
            vec![None, None, Some(2)]
        );
        assert_eq!(transport.texts(ConversationId::new(3)), vec!["pong"]);
    }
}
