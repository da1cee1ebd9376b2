//! Periodic background reindexing.
//!
//! While the server runs, the full pipeline is re-invoked every
//! `indexing.interval_minutes`. The first tick fires one interval after
//! start-up. A tick that lands while a run is still in flight (scheduled
//! or manual) is skipped and logged.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::error::IndexError;
use crate::service::VaultSearch;

/// Spawn the reindex loop. It exits when `shutdown` flips to `true` or
/// its sender is dropped.
pub fn spawn_periodic_reindex(
    service: Arc<VaultSearch>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_secs = period.as_secs(), "scheduled reindex enabled");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match service.reindex().await {
                Ok(result) => info!(
                    processed = result.processed,
                    skipped = result.skipped,
                    errors = result.errors,
                    "scheduled reindex finished"
                ),
                Err(IndexError::RunInProgress) => {
                    warn!("previous index run still in progress; skipping scheduled run")
                }
                Err(e) => error!(error = %e, "scheduled reindex failed"),
            }
        }

        info!("scheduled reindex stopped");
    })
}
