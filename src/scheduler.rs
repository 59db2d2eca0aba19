//! Background scheduler: runs the periodic reminder jobs for the lifetime
//! of the process.
//!
//! Three independent tokio tasks:
//! 1. Dispatch sweep every `DISPATCH_INTERVAL_SECS`
//! 2. Missed-dose check every `MISSED_CHECK_INTERVAL_SECS`
//! 3. Weekly summary at `WEEKLY_SUMMARY_WEEKDAY` `WEEKLY_SUMMARY_HOUR`:00 local time
//!
//! Each task awaits its job before waiting for the next tick, so runs of
//! the same job never overlap. A slow run delays the next one; missed ticks
//! are skipped, not replayed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, NaiveTime};
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{
    DISPATCH_INTERVAL_SECS, MISSED_CHECK_INTERVAL_SECS, WEEKLY_SUMMARY_HOUR, WEEKLY_SUMMARY_WEEKDAY,
};
use crate::core_state::CoreState;
use crate::reminders::{self, ReminderError, SweepReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Dispatch,
    MissedCheck,
    WeeklySummary,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::MissedCheck => "missed-check",
            Self::WeeklySummary => "weekly-summary",
        }
    }

    pub async fn run(self, state: &CoreState) -> Result<SweepReport, ReminderError> {
        match self {
            Self::Dispatch => reminders::run_dispatch_sweep(state).await,
            Self::MissedCheck => reminders::run_missed_dose_check(state).await,
            Self::WeeklySummary => reminders::run_weekly_summary(state).await,
        }
    }
}

/// Handle for the running jobs.
///
/// Dropping it signals shutdown; a job already running finishes its pass.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signal shutdown and wait for every task to exit.
    pub async fn stop(mut self) {
        self.shutdown();
        for result in join_all(self.tasks.drain(..)).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the three jobs. Must be called inside a tokio runtime.
pub fn start_scheduler(state: Arc<CoreState>) -> SchedulerHandle {
    let (shutdown, rx) = watch::channel(false);
    let tasks = vec![
        tokio::spawn(interval_loop(
            state.clone(),
            Job::Dispatch,
            Duration::from_secs(DISPATCH_INTERVAL_SECS),
            rx.clone(),
        )),
        tokio::spawn(interval_loop(
            state.clone(),
            Job::MissedCheck,
            Duration::from_secs(MISSED_CHECK_INTERVAL_SECS),
            rx.clone(),
        )),
        tokio::spawn(weekly_loop(state, rx)),
    ];
    tracing::info!(
        dispatch_secs = DISPATCH_INTERVAL_SECS,
        missed_check_secs = MISSED_CHECK_INTERVAL_SECS,
        "Reminder scheduler started"
    );
    SchedulerHandle { shutdown, tasks }
}

async fn interval_loop(state: Arc<CoreState>, job: Job, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => run_logged(&state, job).await,
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
    }
    tracing::info!(job = job.name(), "Scheduler job stopped");
}

async fn weekly_loop(state: Arc<CoreState>, mut shutdown: watch::Receiver<bool>) {
    let mut next = next_weekly_run(state.now());
    tracing::info!(next_run = %next, "Weekly summary scheduled");

    loop {
        let wait = (next - state.now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
        // Sleeping is monotonic; the wall clock may lag behind it.
        if state.now() < next {
            continue;
        }
        run_logged(&state, Job::WeeklySummary).await;
        next = next_weekly_run(state.now());
        tracing::info!(next_run = %next, "Weekly summary scheduled");
    }
    tracing::info!(job = Job::WeeklySummary.name(), "Scheduler job stopped");
}

async fn run_logged(state: &CoreState, job: Job) {
    if let Err(e) = job.run(state).await {
        tracing::error!(job = job.name(), error = %e, "Scheduled job failed");
    }
}

/// First weekly-summary instant strictly after `after`.
pub fn next_weekly_run(after: NaiveDateTime) -> NaiveDateTime {
    let target = WEEKLY_SUMMARY_WEEKDAY.num_days_from_monday() as i64;
    let today = after.weekday().num_days_from_monday() as i64;
    let days_ahead = (target - today).rem_euclid(7);

    let at = NaiveTime::from_hms_opt(WEEKLY_SUMMARY_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    let candidate = (after.date() + chrono::Duration::days(days_ahead)).and_time(at);
    if candidate > after {
        candidate
    } else {
        candidate + chrono::Duration::days(7)
    }
}
