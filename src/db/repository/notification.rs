use std::collections::HashSet;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{
    format_timestamp, parse_optional_timestamp, parse_timestamp, parse_uuid, DatabaseError,
};
use crate::models::enums::*;
use crate::models::*;

const NOTIFICATION_COLUMNS: &str = "id, user_id, medication_id, title, message, scheduled_time,
    status, sent_at, is_taken, taken_at, missed_at, type, created_at";

/// Filter for the notification list endpoint.
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub status: Option<NotificationStatus>,
    pub kind: Option<NotificationType>,
    pub limit: u32,
}

/// Insert a batch of notifications. Callers wanting all-or-nothing pass a transaction.
pub fn insert_notifications(conn: &Connection, items: &[Notification]) -> Result<usize, DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO notifications (id, user_id, medication_id, title, message, scheduled_time,
         status, sent_at, is_taken, taken_at, missed_at, type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;

    for n in items {
        stmt.execute(params![
            n.id.to_string(),
            n.user_id.to_string(),
            n.medication_id.to_string(),
            n.title,
            n.message,
            format_timestamp(&n.scheduled_time),
            n.state.status().as_str(),
            n.state.sent_at().map(|t| format_timestamp(&t)),
            n.state.is_taken() as i32,
            n.state.taken_at().map(|t| format_timestamp(&t)),
            n.state.missed_at().map(|t| format_timestamp(&t)),
            n.kind.as_str(),
            format_timestamp(&n.created_at),
        ])?;
    }
    Ok(items.len())
}

/// Remove every still-pending reminder of a medication (schedule regeneration).
pub fn purge_pending_for_medication(conn: &Connection, medication_id: &Uuid) -> Result<usize, DatabaseError> {
    let removed = conn.execute(
        "DELETE FROM notifications WHERE medication_id = ?1 AND status = 'pending' AND is_taken = 0",
        params![medication_id.to_string()],
    )?;
    Ok(removed)
}

/// Scheduled instants of a medication that already progressed past `pending`
/// or already have a ledger outcome (the reminder may since have been deleted).
pub fn settled_slots_for_medication(
    conn: &Connection,
    medication_id: &Uuid,
) -> Result<HashSet<NaiveDateTime>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT scheduled_time FROM notifications
         WHERE medication_id = ?1 AND (status <> 'pending' OR is_taken = 1)
         UNION
         SELECT scheduled_time FROM adherence_logs WHERE medication_id = ?1",
    )?;
    let rows = stmt.query_map(params![medication_id.to_string()], |row| row.get::<_, String>(0))?;

    let mut slots = HashSet::new();
    for row in rows {
        slots.insert(parse_timestamp(&row?)?);
    }
    Ok(slots)
}

/// Dispatch predicate: pending, never sent, not taken, due at or before `now`.
pub fn find_due_notifications(conn: &Connection, now: &NaiveDateTime) -> Result<Vec<Notification>, DatabaseError> {
    query_notifications(
        conn,
        &format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE status = 'pending' AND sent_at IS NULL AND is_taken = 0
               AND scheduled_time <= ?1
             ORDER BY scheduled_time ASC"
        ),
        params![format_timestamp(now)],
    )
}

/// Missed predicate: pending or sent, not taken, scheduled strictly before `cutoff`.
pub fn find_overdue_notifications(
    conn: &Connection,
    cutoff: &NaiveDateTime,
) -> Result<Vec<Notification>, DatabaseError> {
    query_notifications(
        conn,
        &format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE status IN ('pending', 'sent') AND is_taken = 0
               AND scheduled_time < ?1
             ORDER BY scheduled_time ASC"
        ),
        params![format_timestamp(cutoff)],
    )
}

pub fn get_notification_for_user(
    conn: &Connection,
    user_id: &Uuid,
    id: &Uuid,
) -> Result<Option<Notification>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1 AND user_id = ?2"),
            params![id.to_string(), user_id.to_string()],
            notification_row_from_rusqlite,
        )
        .optional()?;
    row.map(notification_from_row).transpose()
}

pub fn get_notification(conn: &Connection, id: &Uuid) -> Result<Option<Notification>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
            params![id.to_string()],
            notification_row_from_rusqlite,
        )
        .optional()?;
    row.map(notification_from_row).transpose()
}

/// Persist `next` only if the row is still in the state `current` was read in.
///
/// Returns false when another writer moved the row first (or it was deleted).
pub fn apply_transition(
    conn: &Connection,
    current: &Notification,
    next: &DoseState,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE notifications
         SET status = ?1, sent_at = ?2, is_taken = ?3, taken_at = ?4, missed_at = ?5
         WHERE id = ?6 AND status = ?7 AND is_taken = ?8",
        params![
            next.status().as_str(),
            next.sent_at().map(|t| format_timestamp(&t)),
            next.is_taken() as i32,
            next.taken_at().map(|t| format_timestamp(&t)),
            next.missed_at().map(|t| format_timestamp(&t)),
            current.id.to_string(),
            current.state.status().as_str(),
            current.state.is_taken() as i32,
        ],
    )?;
    Ok(changed == 1)
}

pub fn list_notifications(
    conn: &Connection,
    user_id: &Uuid,
    filter: &NotificationFilter,
) -> Result<Vec<Notification>, DatabaseError> {
    query_notifications(
        conn,
        &format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2) AND (?3 IS NULL OR type = ?3)
             ORDER BY scheduled_time DESC
             LIMIT ?4"
        ),
        params![
            user_id.to_string(),
            filter.status.map(|s| s.as_str()),
            filter.kind.map(|k| k.as_str()),
            filter.limit,
        ],
    )
}

/// Everything scheduled on one calendar day, earliest first.
pub fn list_notifications_for_day(
    conn: &Connection,
    user_id: &Uuid,
    day: NaiveDate,
) -> Result<Vec<Notification>, DatabaseError> {
    let start = day.and_hms_opt(0, 0, 0).unwrap_or_default();
    let end = start + chrono::Duration::days(1);
    query_notifications(
        conn,
        &format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = ?1 AND scheduled_time >= ?2 AND scheduled_time < ?3
             ORDER BY scheduled_time ASC"
        ),
        params![user_id.to_string(), format_timestamp(&start), format_timestamp(&end)],
    )
}

/// Delivered reminders the patient has not opened yet.
pub fn count_unread(conn: &Connection, user_id: &Uuid) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND status = 'sent'",
        params![user_id.to_string()],
        |row| row.get::<_, u32>(0),
    )?;
    Ok(count)
}

/// Move every delivered reminder to `read`. Future pending reminders are untouched.
pub fn mark_all_read(conn: &Connection, user_id: &Uuid) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE notifications SET status = 'read'
         WHERE user_id = ?1 AND status = 'sent' AND is_taken = 0",
        params![user_id.to_string()],
    )?;
    Ok(changed)
}

pub fn delete_notification(conn: &Connection, user_id: &Uuid, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
        params![id.to_string(), user_id.to_string()],
    )?;
    Ok(changed > 0)
}

/// Confirmed doses scheduled inside `[start, end)`, most recent first.
pub fn list_taken_history(
    conn: &Connection,
    user_id: &Uuid,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> Result<Vec<Notification>, DatabaseError> {
    query_notifications(
        conn,
        &format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = ?1 AND is_taken = 1
               AND scheduled_time >= ?2 AND scheduled_time < ?3
             ORDER BY scheduled_time DESC"
        ),
        params![user_id.to_string(), format_timestamp(start), format_timestamp(end)],
    )
}

fn query_notifications(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Notification>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, notification_row_from_rusqlite)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(notification_from_row(row?)?);
    }
    Ok(items)
}

struct NotificationRow {
    id: String,
    user_id: String,
    medication_id: String,
    title: String,
    message: String,
    scheduled_time: String,
    status: String,
    sent_at: Option<String>,
    is_taken: i32,
    taken_at: Option<String>,
    missed_at: Option<String>,
    kind: String,
    created_at: String,
}

fn notification_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<NotificationRow, rusqlite::Error> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        medication_id: row.get(2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        scheduled_time: row.get(5)?,
        status: row.get(6)?,
        sent_at: row.get(7)?,
        is_taken: row.get(8)?,
        taken_at: row.get(9)?,
        missed_at: row.get(10)?,
        kind: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn notification_from_row(row: NotificationRow) -> Result<Notification, DatabaseError> {
    let status = NotificationStatus::from_str(&row.status)?;
    let state = DoseState::from_columns(
        status,
        parse_optional_timestamp(row.sent_at)?,
        row.is_taken != 0,
        parse_optional_timestamp(row.taken_at)?,
        parse_optional_timestamp(row.missed_at)?,
    )
    .ok_or_else(|| {
        DatabaseError::ConstraintViolation(format!(
            "Notification {} has an inconsistent lifecycle ({})",
            row.id, row.status
        ))
    })?;

    Ok(Notification {
        id: parse_uuid(&row.id)?,
        user_id: parse_uuid(&row.user_id)?,
        medication_id: parse_uuid(&row.medication_id)?,
        title: row.title,
        message: row.message,
        scheduled_time: parse_timestamp(&row.scheduled_time)?,
        kind: NotificationType::from_str(&row.kind)?,
        state,
        created_at: parse_timestamp(&row.created_at)?,
    })
}
