//! Background refresh task.
//!
//! Runs the refresh pipeline on a fixed timer so the snapshot stays warm
//! even without scheduler hits on `/_refresh`. The pipeline's own gates
//! (interval check, refresh lock) make the timer safe to run alongside
//! scheduler-driven refreshes and other instances.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use super::pipeline::{RefreshOutcome, RefreshPipeline};

/// How often the background task wakes up, relative to the refresh
/// interval. Waking more often than the interval costs nothing (the
/// `NotDue` gate exits immediately) and keeps the first due refresh from
/// waiting a full interval.
const WAKE_DIVISOR: u32 = 4;

/// Spawn the periodic refresh task. The task runs until the process
/// exits.
pub fn start_updater(pipeline: Arc<RefreshPipeline>, refresh_interval_secs: u64) -> JoinHandle<()> {
    let wake_every = Duration::from_secs((refresh_interval_secs / u64::from(WAKE_DIVISOR)).max(1));

    tokio::spawn(async move {
        info!(
            "Background updater started (waking every {} seconds)",
            wake_every.as_secs()
        );

        let mut timer = interval(wake_every);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            match pipeline.run().await {
                Ok(RefreshOutcome::Refreshed { added, enriched }) => {
                    info!("Background refresh: {added} new item(s), {enriched} enriched");
                }
                Ok(RefreshOutcome::Rerendered) => {
                    info!("Background refresh rebuilt the snapshot page");
                }
                Ok(RefreshOutcome::NotDue) => {
                    debug!("Background refresh not due yet");
                }
                Ok(RefreshOutcome::Locked) => {
                    debug!("Background refresh skipped, lock held elsewhere");
                }
                Ok(RefreshOutcome::TimedOut) => {
                    error!("Background refresh timed out");
                }
                Ok(RefreshOutcome::FetchFailed) => {
                    error!("Background refresh could not fetch the feed");
                }
                Err(e) => {
                    error!("Background refresh failed: {e}");
                }
            }
        }
    })
}
