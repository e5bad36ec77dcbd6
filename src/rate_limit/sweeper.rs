//! Background eviction of expired windows.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::observability::metrics;
use crate::rate_limit::TenantRateLimiter;

/// Periodically evict expired windows until shutdown is signalled.
pub fn spawn_sweeper(
    limiter: Arc<TenantRateLimiter>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Rate limit sweeper starting");

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = limiter.evict_expired();
                    let tracked = limiter.tracked_tenants();
                    if evicted > 0 {
                        tracing::debug!(evicted, tracked, "Evicted expired rate limit windows");
                    }
                    metrics::record_tracked_tenants(tracked);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    })
}
