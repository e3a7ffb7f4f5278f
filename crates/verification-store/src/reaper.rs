//! Background sweep of expired verification codes
//!
//! `take()` already rejects expired codes on its own; the reaper exists so
//! codes that are never redeemed don't accumulate. It runs for the lifetime
//! of the process and stops only when its cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::VerificationStore;

/// Default interval between sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the reaper task.
///
/// Sweeps every `interval` until `cancel` fires. Each sweep runs as its own
/// task so a panic inside one sweep is logged and the loop keeps going.
pub fn spawn_reaper(
    store: Arc<VerificationStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the immediate first tick; the store starts empty
        ticker.tick().await;

        info!(interval_secs = interval.as_secs(), "verification code reaper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("verification code reaper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    sweep_once(&store).await;
                }
            }
        }
    })
}

async fn sweep_once(store: &Arc<VerificationStore>) {
    let store = store.clone();
    match tokio::spawn(async move { store.sweep_expired().await }).await {
        Ok(0) => debug!("reaper sweep found nothing to remove"),
        Ok(removed) => debug!(removed, "reaper sweep complete"),
        Err(e) => warn!(error = %e, "reaper sweep failed, will retry next interval"),
    }
}
