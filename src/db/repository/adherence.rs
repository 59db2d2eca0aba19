use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{
    format_timestamp, parse_optional_timestamp, parse_timestamp, parse_uuid, DatabaseError,
};
use crate::models::enums::*;
use crate::models::*;

/// Append one ledger entry.
///
/// The ledger is unique on (patient, medication, scheduled time): a dose that
/// already has an outcome is left alone and `Ok(false)` is returned.
pub fn append_adherence_entry(conn: &Connection, entry: &AdherenceLogEntry) -> Result<bool, DatabaseError> {
    if !entry.is_consistent() {
        return Err(DatabaseError::ConstraintViolation(format!(
            "Adherence entry {} has outcome {} with taken_at {:?}",
            entry.id, entry.status, entry.taken_at
        )));
    }

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO adherence_logs
         (id, user_id, medication_id, scheduled_time, taken_at, status, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.id.to_string(),
            entry.user_id.to_string(),
            entry.medication_id.to_string(),
            format_timestamp(&entry.scheduled_time),
            entry.taken_at.map(|t| format_timestamp(&t)),
            entry.status.as_str(),
            entry.notes,
            format_timestamp(&entry.created_at),
        ],
    )?;
    Ok(inserted == 1)
}

/// Outcome counts for entries scheduled inside `[start, end)`: (total, taken, missed).
pub fn count_adherence_outcomes(
    conn: &Connection,
    user_id: &Uuid,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> Result<(u32, u32, u32), DatabaseError> {
    let counts = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'taken' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'missed' THEN 1 ELSE 0 END), 0)
         FROM adherence_logs
         WHERE user_id = ?1 AND scheduled_time >= ?2 AND scheduled_time < ?3",
        params![user_id.to_string(), format_timestamp(start), format_timestamp(end)],
        |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?, row.get::<_, u32>(2)?)),
    )?;
    Ok(counts)
}

/// Ledger entries scheduled inside `[start, end)`, most recent first.
pub fn list_adherence_entries(
    conn: &Connection,
    user_id: &Uuid,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> Result<Vec<AdherenceLogEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, medication_id, scheduled_time, taken_at, status, notes, created_at
         FROM adherence_logs
         WHERE user_id = ?1 AND scheduled_time >= ?2 AND scheduled_time < ?3
         ORDER BY scheduled_time DESC",
    )?;
    let rows = stmt.query_map(
        params![user_id.to_string(), format_timestamp(start), format_timestamp(end)],
        |row| {
            Ok(AdherenceRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                medication_id: row.get(2)?,
                scheduled_time: row.get(3)?,
                taken_at: row.get(4)?,
                status: row.get(5)?,
                notes: row.get(6)?,
                created_at: row.get(7)?,
            })
        },
    )?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(adherence_from_row(row?)?);
    }
    Ok(entries)
}

struct AdherenceRow {
    id: String,
    user_id: String,
    medication_id: String,
    scheduled_time: String,
    taken_at: Option<String>,
    status: String,
    notes: Option<String>,
    created_at: String,
}

fn adherence_from_row(row: AdherenceRow) -> Result<AdherenceLogEntry, DatabaseError> {
    Ok(AdherenceLogEntry {
        id: parse_uuid(&row.id)?,
        user_id: parse_uuid(&row.user_id)?,
        medication_id: parse_uuid(&row.medication_id)?,
        scheduled_time: parse_timestamp(&row.scheduled_time)?,
        taken_at: parse_optional_timestamp(row.taken_at)?,
        status: AdherenceOutcome::from_str(&row.status)?,
        notes: row.notes,
        created_at: parse_timestamp(&row.created_at)?,
    })
}
