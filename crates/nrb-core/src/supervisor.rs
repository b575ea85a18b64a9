//! Startup supervisor: restart the whole bootstrap on network failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::Result;

/// Fixed delay between bootstrap attempts.
pub const STARTUP_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Run `attempt` until it succeeds or fails with a non-network error.
///
/// Network-class failures are retried forever after `delay`, with no backoff
/// growth. Anything else is returned to the caller.
pub async fn supervise<F, Fut>(delay: Duration, mut attempt: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut restarts: u64 = 0;
    loop {
        match attempt().await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_network() => {
                restarts += 1;
                tracing::error!(restarts, "Network error during bot startup: {e}");
                tracing::info!("Will retry in {} seconds...", delay.as_secs());
                sleep(delay).await;
            }
            Err(e) => {
                tracing::error!("Error starting bot: {e}");
                return Err(e);
            }
        }
    }
}
