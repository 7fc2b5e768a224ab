//! services/api/src/sweeper.rs
//!
//! Background task that deletes expired cache entries on a fixed interval.

use readwithme_core::ResponseCache;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs `ResponseCache::sweep` every `interval` until the token is cancelled.
/// A failed sweep is logged and retried on the next tick.
pub async fn run_cache_sweeper(
    cache: ResponseCache,
    interval: Duration,
    cancellation_token: CancellationToken,
) {
    info!("Cache sweeper started (every {:?}).", interval);
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; skip it so startup does no extra work.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Cache sweeper stopped.");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = cache.sweep().await {
                    warn!(error = %e, "Cache sweep failed");
                }
            }
        }
    }
}
