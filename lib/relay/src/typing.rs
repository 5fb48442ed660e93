//! Repeating "typing" indicator tied to an outstanding request.

use chat_relay_core::ConversationId;
use chat_relay_telegram::ChatTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handle to a background task re-sending the typing indicator.
///
/// The task stops when [`TypingIndicator::stop`] is called or the handle is
/// dropped, whichever comes first.
#[derive(Debug)]
pub struct TypingIndicator {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TypingIndicator {
    /// Starts the loop. The first repeat fires one `interval` from now.
    pub fn start(
        transport: Arc<dyn ChatTransport>,
        conversation_id: ConversationId,
        interval: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = transport.send_typing_indicator(conversation_id).await {
                            debug!(conversation_id = %conversation_id, error = %e, "Typing indicator failed");
                        }
                    }
                }
            }

            info!(conversation_id = %conversation_id, "Typing finished");
        });

        Self {
            token,
            task: Some(task),
        }
    }

    /// Stops the loop and waits for the task to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Returns true once the loop has been asked to stop.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
