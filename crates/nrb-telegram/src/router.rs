use std::{sync::Arc, time::Duration};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use nrb_core::{
    config::Config,
    errors::Error,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    pipeline::RelayPipeline,
    rewrite::Rewriter,
    security::AuthGate,
    Result,
};

use crate::handlers;
use crate::{startup_error, TelegramMessenger};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RelayPipeline>,
}

fn build_bot(cfg: &Config) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| Error::External(format!("telegram client build error: {e}")))?;
    Ok(Bot::with_client(cfg.telegram_bot_token.clone(), client))
}

/// One bootstrap attempt: verify the token, register the handler and poll
/// until the process is stopped.
///
/// Failures before dispatching starts are returned (network failures as
/// restartable transport errors). Once polling runs, teloxide handles its own
/// reconnects and this only returns on shutdown.
pub async fn run_polling(cfg: Arc<Config>, rewriter: Arc<dyn Rewriter>) -> Result<()> {
    let bot = build_bot(&cfg)?;

    tracing::info!("Verifying bot token...");
    let me = bot.get_me().await.map_err(startup_error)?;
    tracing::info!(
        "Bot verification successful. Connected as {} (@{})",
        me.first_name,
        me.username()
    );

    // Start from a clean queue, like a fresh long-poll with dropped updates.
    bot.delete_webhook()
        .drop_pending_updates(true)
        .await
        .map_err(startup_error)?;

    // Wrap the raw Telegram messenger with a throttling decorator to reduce 429s
    // when several operators forward at once.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let pipeline = Arc::new(RelayPipeline::new(
        AuthGate::new(cfg.allowed_users.iter().copied()),
        rewriter,
        messenger,
        cfg.destination.clone(),
    ));

    if cfg.allowed_users.is_empty() {
        tracing::warn!("ADMIN_USER_ID is empty; every sender will be rejected");
    }
    tracing::info!(
        allowed_users = cfg.allowed_users.len(),
        destination = %cfg.destination,
        "Starting bot"
    );

    let state = Arc::new(AppState { pipeline });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("Dispatcher stopped");
    Ok(())
}
