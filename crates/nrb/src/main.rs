use std::sync::Arc;

use anyhow::Context;

use nrb_core::{
    config::Config,
    rate_limit::MinIntervalGate,
    rewrite::{RateLimitedRewriter, RewriteGenerator, Rewriter},
    supervisor::{supervise, STARTUP_RETRY_DELAY},
};
use nrb_openai::OpenAiClient;

// `.env` is applied with `env::set_var`, so it must run before the runtime
// spawns worker threads.
fn main() -> anyhow::Result<()> {
    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            // Config decides where logs go; fall back to stderr to report the failure.
            let _ = nrb_core::logging::init("nrb", None);
            tracing::error!("Required environment variables are not set: {e}");
            return Err(e.into());
        }
    };
    nrb_core::logging::init("nrb", cfg.log_file.as_deref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(run(cfg))
}

async fn run(cfg: Arc<Config>) -> anyhow::Result<()> {
    let client = Arc::new(OpenAiClient::new(
        cfg.openai_api_key.clone(),
        cfg.openai_base_url.clone(),
        cfg.openai_timeout,
    )?);
    let generator: Arc<dyn Rewriter> = Arc::new(RewriteGenerator::new(
        client,
        cfg.persona_prompt.clone(),
        cfg.openai_model.clone(),
    ));
    let gate = Arc::new(MinIntervalGate::per_minute(cfg.max_requests_per_minute));
    let rewriter: Arc<dyn Rewriter> = Arc::new(RateLimitedRewriter::new(generator, gate));

    tracing::info!(
        model = %cfg.openai_model,
        max_requests_per_minute = cfg.max_requests_per_minute,
        "Rewrite generator ready"
    );

    supervise(STARTUP_RETRY_DELAY, || {
        nrb_telegram::router::run_polling(cfg.clone(), rewriter.clone())
    })
    .await
    .context("telegram bot failed")?;

    Ok(())
}
