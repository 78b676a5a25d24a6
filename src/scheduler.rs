//! Fixed-interval scheduler.
//!
//! Fires the pipeline every `schedule.interval_hours`, starting one
//! interval after launch. A tick that finds a run in flight is skipped,
//! not queued.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::config::MAX_INTERVAL_HOURS;
use crate::pipeline::Harvester;
use crate::runner::{RunCoordinator, TriggerOutcome};

/// Converts the configured interval to a period, clamped to
/// `1..=MAX_INTERVAL_HOURS` hours.
pub fn period_from_hours(hours: u64) -> Duration {
    Duration::from_secs(hours.clamp(1, MAX_INTERVAL_HOURS) * 60 * 60)
}

fn next_after(now: DateTime<Utc>, period: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(period).ok().map(|d| now + d)
}

/// Spawns the scheduling loop on the current runtime.
pub fn spawn_scheduler(
    harvester: Arc<Harvester>,
    coordinator: Arc<RunCoordinator>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        coordinator.set_next_run(next_after(Utc::now(), period)).await;
        info!("Internal scheduler enabled: every {}s", period.as_secs());

        loop {
            ticker.tick().await;
            match coordinator.trigger(&harvester).await {
                TriggerOutcome::Busy => info!("Scheduled run skipped (busy)"),
                TriggerOutcome::Completed { report, .. } => info!(
                    new = report.new_count(),
                    duplicate = report.duplicate_count(),
                    "Scheduled run completed"
                ),
                TriggerOutcome::Failed { error, .. } => error!("Scheduled run failed: {}", error),
            }
            coordinator.set_next_run(next_after(Utc::now(), period)).await;
        }
    })
}
