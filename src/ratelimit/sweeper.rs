//! Background eviction of expired windows.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::clock::Clock;
use super::limiter::FixedWindowLimiter;

/// Spawn a task that calls [`FixedWindowLimiter::purge_expired`] every
/// `interval`.
///
/// The task runs until the returned handle is aborted or the runtime shuts
/// down.
pub fn spawn_sweeper<C>(limiter: Arc<FixedWindowLimiter<C>>, interval: Duration) -> JoinHandle<()>
where
    C: Clock + 'static,
{
    info!(interval = ?interval, "Starting expired entry sweeper");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = limiter.purge_expired();
            debug!(removed, tracked = limiter.len(), "Sweep complete");
        }
    })
}
