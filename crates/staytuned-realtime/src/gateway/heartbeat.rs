//! Idle session sweeper.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::lifecycle::Gateway;

/// Periodically evict sessions with no inbound activity until `shutdown`
/// fires.
pub async fn run_idle_sweeper(
    gateway: Arc<Gateway>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let reaped = gateway.sweep().await;
                if !reaped.is_empty() {
                    info!(count = reaped.len(), "Reaped idle sessions");
                }
            }
        }
    }

    debug!("Idle sweeper stopped");
}
