use chat_relay_ai::OpenAiClient;
use chat_relay_bot::{Command, CommandDispatcher, ReplyOrchestrator, run_polling};
use chat_relay_conversation::ContextStore;
use chat_relay_core::{Clock, SystemClock};
use chat_relay_server::config::RelayConfig;
use chat_relay_telegram::TelegramClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from relay.* and the environment
    let config = RelayConfig::from_env().expect("failed to load configuration");
    tracing::info!(
        model = %config.openai.model,
        timezone = %config.timezone,
        "Loaded configuration"
    );

    let hours = config
        .service_hours()
        .expect("invalid service hours configuration");
    if config.service_hours.bypass {
        tracing::info!("Service hours gate disabled");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(ContextStore::with_clock(
        config.conversation.idle_window(),
        clock.clone(),
    ));

    let provider =
        Arc::new(OpenAiClient::new(config.openai).expect("failed to create completion client"));
    let telegram =
        Arc::new(TelegramClient::new(config.telegram).expect("failed to create Telegram client"));

    match telegram.get_me().await {
        Ok(name) => tracing::info!(bot = %name, "Connected to Telegram"),
        Err(e) => tracing::warn!(error = %e, "Failed to identify bot"),
    }
    if let Err(e) = telegram.set_my_commands(&Command::bot_commands()).await {
        tracing::warn!(error = %e, "Failed to register bot commands");
    }

    let orchestrator = Arc::new(ReplyOrchestrator::new(
        store.clone(),
        provider,
        telegram.clone(),
        &config.conversation,
        config.replies.clone(),
    ));
    let dispatcher = Arc::new(CommandDispatcher::new(
        store,
        orchestrator,
        telegram.clone(),
        hours,
        clock,
        config.replies,
        config.conversation.start_prompt,
    ));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown requested");
                    shutdown.cancel();
                }
                Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        }
    });

    run_polling(telegram, dispatcher, shutdown).await;
    tracing::info!("Stopped");
}
