//! Background eviction of idle identities.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::controller::AdmissionController;

/// Periodically drop identities whose logs have fully expired.
///
/// Keeps registry memory proportional to recently active callers. A zero
/// period disables eviction and returns `None`. Abort the returned handle to
/// stop the task.
pub fn spawn_idle_eviction(
    controller: Arc<AdmissionController>,
    every: Duration,
) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        info!("Idle identity eviction disabled");
        return None;
    }

    info!(interval_secs = every.as_secs(), "Starting idle identity eviction");

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = controller.evict_idle();
            if evicted > 0 {
                debug!(
                    evicted,
                    remaining = controller.identity_count(),
                    "Evicted idle identities"
                );
            }
        }
    }))
}
