//! Schedule generation: one pending reminder per (day, slot) in the future.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::ReminderError;
use crate::db::{self, DatabaseError};
use crate::models::enums::NotificationType;
use crate::models::{DoseState, DoseSlot, Medication, Notification};

pub const REMINDER_TITLE: &str = "Waktunya minum obat";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOutcome {
    pub purged: usize,
    pub created: usize,
}

/// Expand a medication's plan into reminders strictly after `now`.
///
/// Days run from `start_date` to `end_date` inclusive. Duplicate slots
/// collapse to one. Pure: nothing is persisted.
pub fn plan_notifications(med: &Medication, now: NaiveDateTime) -> Vec<Notification> {
    let slots: BTreeSet<DoseSlot> = med.time_slots.iter().copied().collect();
    if slots.is_empty() || med.end_date < now.date() {
        return Vec::new();
    }

    let mut day = med.start_date.max(now.date());
    let mut planned = Vec::new();
    while day <= med.end_date {
        for slot in &slots {
            let scheduled_time = slot.on(day);
            if scheduled_time <= now {
                continue;
            }
            planned.push(Notification {
                id: Uuid::new_v4(),
                user_id: med.user_id,
                medication_id: med.id,
                title: REMINDER_TITLE.to_string(),
                message: format!("Saatnya minum {} ({}) pukul {}", med.name, med.dose, slot),
                scheduled_time,
                kind: NotificationType::Reminder,
                state: DoseState::Pending,
                created_at: now,
            });
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    planned
}

/// Persist the plan for a freshly created medication. All-or-nothing.
pub fn generate_schedule(conn: &Connection, med: &Medication, now: NaiveDateTime) -> Result<usize, ReminderError> {
    let tx = conn.unchecked_transaction()?;
    let outcome = write_schedule(&tx, med, now, false)?;
    tx.commit()?;
    Ok(outcome.created)
}

/// Purge every pending reminder of `med`, then generate afresh, in one
/// transaction. Reminders that already progressed (sent, read, taken,
/// missed, dismissed) are kept and their slots are not recreated.
pub fn regenerate_schedule(
    conn: &Connection,
    med: &Medication,
    now: NaiveDateTime,
) -> Result<ScheduleOutcome, ReminderError> {
    let tx = conn.unchecked_transaction()?;
    let outcome = write_schedule(&tx, med, now, true)?;
    tx.commit()?;
    Ok(outcome)
}

/// Schedule writes without a transaction of their own, for callers that
/// already hold one.
pub(crate) fn write_schedule(
    conn: &Connection,
    med: &Medication,
    now: NaiveDateTime,
    purge: bool,
) -> Result<ScheduleOutcome, DatabaseError> {
    let purged = if purge {
        db::purge_pending_for_medication(conn, &med.id)?
    } else {
        0
    };
    let created = if med.wants_reminders() {
        let settled = db::settled_slots_for_medication(conn, &med.id)?;
        let plan: Vec<Notification> = plan_notifications(med, now)
            .into_iter()
            .filter(|n| !settled.contains(&n.scheduled_time))
            .collect();
        db::insert_notifications(conn, &plan)?
    } else {
        0
    };

    tracing::info!(medication_id = %med.id, purged, created, "Reminder schedule written");
    Ok(ScheduleOutcome { purged, created })
}
