//! Background pruning of entities that stop receiving samples.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::service::AggregationService;

/// Spawn a task that calls [`AggregationService::housekeep`] every
/// `period` until `shutdown` carries `true` or its sender is dropped.
///
/// Failed passes are reported and retried on the next tick; the service
/// itself never retries.
pub fn spawn_housekeeping(
    service: Arc<AggregationService>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting housekeeping every {}s", period.as_secs());

        let mut ticker = interval(period);
        let mut consecutive_failures = 0u32;

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

            match service.housekeep(OffsetDateTime::now_utc()).await {
                Ok(removed) => {
                    consecutive_failures = 0;
                    if removed > 0 {
                        info!("Housekeeping pruned {} stale samples", removed);
                    } else {
                        debug!("Housekeeping found nothing to prune");
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    if consecutive_failures <= 3 {
                        warn!("Housekeeping failed: {} (attempt {})", e, consecutive_failures);
                    } else if consecutive_failures == 4 {
                        error!(
                            "Housekeeping failed {} times in a row, will keep retrying silently",
                            consecutive_failures
                        );
                    }
                }
            }
        }

        info!("Housekeeping stopped");
    })
}
