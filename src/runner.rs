//! Run coordination: at most one pipeline run in flight.
//!
//! [`RunCoordinator`] is owned by the host process and shared by every
//! trigger (scheduler, HTTP, CLI). A trigger that arrives while a run is
//! in progress gets [`TriggerOutcome::Busy`] immediately; it is never
//! queued.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::models::RunReport;
use crate::pipeline::Harvester;

/// Result of asking for a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum TriggerOutcome {
    #[serde(rename = "busy")]
    Busy,
    #[serde(rename = "ok")]
    Completed {
        #[serde(rename = "lastRun")]
        finished_at: DateTime<Utc>,
        report: RunReport,
    },
    #[serde(rename = "error")]
    Failed {
        #[serde(rename = "lastRun")]
        finished_at: DateTime<Utc>,
        error: String,
    },
}

/// Holds the busy flag; releasing happens on drop.
pub struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[derive(Default)]
pub struct RunCoordinator {
    running: AtomicBool,
    last: Mutex<Option<TriggerOutcome>>,
    next_run: Mutex<Option<DateTime<Utc>>>,
}

impl RunCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the run slot, or `None` if a run is already in flight.
    pub fn try_acquire(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                running: &self.running,
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs the pipeline unless another run holds the slot.
    pub async fn trigger(&self, harvester: &Harvester) -> TriggerOutcome {
        let Some(_guard) = self.try_acquire() else {
            return TriggerOutcome::Busy;
        };

        let outcome = match harvester.run_once().await {
            Ok(report) => TriggerOutcome::Completed {
                finished_at: Utc::now(),
                report,
            },
            Err(e) => TriggerOutcome::Failed {
                finished_at: Utc::now(),
                error: format!("{:#}", e),
            },
        };

        *self.last.lock().await = Some(outcome.clone());
        outcome
    }

    /// The most recent finished run, if any.
    pub async fn last_outcome(&self) -> Option<TriggerOutcome> {
        self.last.lock().await.clone()
    }

    pub async fn next_run(&self) -> Option<DateTime<Utc>> {
        *self.next_run.lock().await
    }

    pub async fn set_next_run(&self, at: Option<DateTime<Utc>>) {
        *self.next_run.lock().await = at;
    }
}
