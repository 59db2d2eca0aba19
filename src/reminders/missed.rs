//! Missed-dose detection.
//!
//! A reminder still pending or sent once its grace period has fully elapsed
//! is closed as missed. The ledger entry and the state change commit
//! together; the escalation email follows, best-effort.

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use super::{load_dose_context, ReminderError, SweepReport};
use crate::core_state::CoreState;
use crate::db;
use crate::email::TemplateData;
use crate::models::enums::RecipientToggle;
use crate::models::{AdherenceLogEntry, Notification};

/// Reminders scheduled strictly before this instant are overdue.
pub fn missed_cutoff(now: NaiveDateTime, grace_minutes: i64) -> NaiveDateTime {
    now - Duration::minutes(grace_minutes)
}

pub async fn run_missed_dose_check(state: &CoreState) -> Result<SweepReport, ReminderError> {
    let now = state.now();
    let cutoff = missed_cutoff(now, state.config().grace_minutes);
    let overdue = {
        let conn = state.db()?;
        db::find_overdue_notifications(&conn, &cutoff)?
    };

    let mut report = SweepReport {
        considered: overdue.len(),
        ..SweepReport::default()
    };

    for notification in &overdue {
        if let Err(e) = escalate_one(state, notification, now, &mut report).await {
            report.errors += 1;
            tracing::warn!(notification_id = %notification.id, error = %e, "Missed-dose handling failed");
        }
    }

    if report.considered > 0 {
        tracing::info!(
            considered = report.considered,
            missed = report.processed,
            conflicts = report.conflicts,
            delivery_failures = report.delivery_failures,
            errors = report.errors,
            "Missed-dose check finished"
        );
    }
    Ok(report)
}

/// Close one overdue reminder as missed and append its ledger entry.
///
/// Returns false when the reminder moved on (e.g. confirmed) since it was
/// read; nothing is written in that case.
pub fn record_missed_dose(
    conn: &Connection,
    notification: &Notification,
    now: NaiveDateTime,
) -> Result<bool, ReminderError> {
    let next = notification.state.mark_missed(now)?;

    let tx = conn.unchecked_transaction()?;
    if !db::apply_transition(&tx, notification, &next)? {
        return Ok(false);
    }
    let entry = AdherenceLogEntry::missed(
        notification.user_id,
        notification.medication_id,
        notification.scheduled_time,
        now,
    );
    if !db::append_adherence_entry(&tx, &entry)? {
        tracing::debug!(notification_id = %notification.id, "Ledger already holds this dose");
    }
    tx.commit()?;
    Ok(true)
}

async fn escalate_one(
    state: &CoreState,
    notification: &Notification,
    now: NaiveDateTime,
    report: &mut SweepReport,
) -> Result<(), ReminderError> {
    let context = {
        let conn = state.db()?;
        if !record_missed_dose(&conn, notification, now)? {
            report.conflicts += 1;
            return Ok(());
        }
        load_dose_context(&conn, notification, RecipientToggle::DoseAlerts)?
    };
    report.processed += 1;

    let Some(context) = context.filter(|c| !c.recipients.is_empty()) else {
        report.skipped += 1;
        return Ok(());
    };

    let message = TemplateData::Missed(context.details)
        .render(context.recipients, &state.config().app_url);
    if state.delivery().deliver(&message, now).await.is_none() {
        report.delivery_failures += 1;
    }
    Ok(())
}
