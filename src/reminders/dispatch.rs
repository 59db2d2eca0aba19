//! Dispatch sweep: promote due reminders to `sent` and email them.
//!
//! Delivery is best-effort. A reminder whose email fails is still marked
//! sent, so the sweep attempts each reminder at most once.

use super::{load_dose_context, ReminderError, SweepReport};
use crate::core_state::CoreState;
use crate::db;
use crate::email::TemplateData;
use crate::models::enums::RecipientToggle;
use crate::models::Notification;

pub async fn run_dispatch_sweep(state: &CoreState) -> Result<SweepReport, ReminderError> {
    let now = state.now();
    let due = {
        let conn = state.db()?;
        db::find_due_notifications(&conn, &now)?
    };

    let mut report = SweepReport {
        considered: due.len(),
        ..SweepReport::default()
    };

    for notification in &due {
        if let Err(e) = dispatch_one(state, notification, &mut report).await {
            report.errors += 1;
            tracing::warn!(notification_id = %notification.id, error = %e, "Dispatch failed for reminder");
        }
    }

    if report.considered > 0 {
        tracing::info!(
            considered = report.considered,
            sent = report.processed,
            skipped = report.skipped,
            conflicts = report.conflicts,
            delivery_failures = report.delivery_failures,
            errors = report.errors,
            "Dispatch sweep finished"
        );
    }
    Ok(report)
}

async fn dispatch_one(
    state: &CoreState,
    notification: &Notification,
    report: &mut SweepReport,
) -> Result<(), ReminderError> {
    let now = state.now();
    let context = {
        let conn = state.db()?;
        load_dose_context(&conn, notification, RecipientToggle::DoseAlerts)?
    };

    let Some(context) = context else {
        report.skipped += 1;
        tracing::debug!(notification_id = %notification.id, "Owner or medication gone, skipping");
        return Ok(());
    };
    if context.recipients.is_empty() {
        report.skipped += 1;
        tracing::debug!(notification_id = %notification.id, "No recipients, skipping");
        return Ok(());
    }

    let message = TemplateData::Reminder(context.details)
        .render(context.recipients, &state.config().app_url);
    if state.delivery().deliver(&message, now).await.is_none() {
        report.delivery_failures += 1;
    }

    let next = notification.state.dispatch(now)?;
    let applied = {
        let conn = state.db()?;
        db::apply_transition(&conn, notification, &next)?
    };
    if applied {
        report.processed += 1;
    } else {
        report.conflicts += 1;
        tracing::debug!(notification_id = %notification.id, "Reminder changed during dispatch");
    }
    Ok(())
}
