use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_date, parse_timestamp, parse_uuid, DatabaseError};
use crate::models::enums::*;
use crate::models::*;

const MEDICATION_COLUMNS: &str = "id, user_id, name, dose, frequency, time_slots, start_date,
    end_date, notes, status, reminder_enabled, created_at, updated_at";

fn slots_to_json(slots: &[DoseSlot]) -> Result<String, DatabaseError> {
    serde_json::to_string(slots)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Invalid time slots: {e}")))
}

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (id, user_id, name, dose, frequency, time_slots, start_date,
         end_date, notes, status, reminder_enabled, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            med.id.to_string(),
            med.user_id.to_string(),
            med.name,
            med.dose,
            med.frequency.as_str(),
            slots_to_json(&med.time_slots)?,
            med.start_date.to_string(),
            med.end_date.to_string(),
            med.notes,
            med.status.as_str(),
            med.reminder_enabled as i32,
            format_timestamp(&med.created_at),
            format_timestamp(&med.updated_at),
        ],
    )?;
    Ok(())
}

/// Overwrite every mutable field. Scoped to the owner.
pub fn update_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE medications SET name = ?1, dose = ?2, frequency = ?3, time_slots = ?4,
         start_date = ?5, end_date = ?6, notes = ?7, status = ?8, reminder_enabled = ?9,
         updated_at = ?10
         WHERE id = ?11 AND user_id = ?12",
        params![
            med.name,
            med.dose,
            med.frequency.as_str(),
            slots_to_json(&med.time_slots)?,
            med.start_date.to_string(),
            med.end_date.to_string(),
            med.notes,
            med.status.as_str(),
            med.reminder_enabled as i32,
            format_timestamp(&med.updated_at),
            med.id.to_string(),
            med.user_id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "medication".into(),
            id: med.id.to_string(),
        });
    }
    Ok(())
}

/// Fetch a medication only if it belongs to `user_id`.
pub fn get_medication_for_user(
    conn: &Connection,
    user_id: &Uuid,
    id: &Uuid,
) -> Result<Option<Medication>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE id = ?1 AND user_id = ?2"),
            params![id.to_string(), user_id.to_string()],
            medication_row_from_rusqlite,
        )
        .optional()?;
    row.map(medication_from_row).transpose()
}

pub fn get_medication(conn: &Connection, id: &Uuid) -> Result<Option<Medication>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE id = ?1"),
            params![id.to_string()],
            medication_row_from_rusqlite,
        )
        .optional()?;
    row.map(medication_from_row).transpose()
}

pub fn list_medications_for_user(
    conn: &Connection,
    user_id: &Uuid,
    status: Option<MedicationStatus>,
) -> Result<Vec<Medication>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEDICATION_COLUMNS} FROM medications
         WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(
        params![user_id.to_string(), status.map(|s| s.as_str())],
        medication_row_from_rusqlite,
    )?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row?)?);
    }
    Ok(meds)
}

/// Delete a medication owned by `user_id`. Notifications go with it (FK cascade).
/// Returns false when nothing matched.
pub fn delete_medication(conn: &Connection, user_id: &Uuid, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM medications WHERE id = ?1 AND user_id = ?2",
        params![id.to_string(), user_id.to_string()],
    )?;
    Ok(changed > 0)
}

struct MedicationRow {
    id: String,
    user_id: String,
    name: String,
    dose: String,
    frequency: String,
    time_slots: String,
    start_date: String,
    end_date: String,
    notes: Option<String>,
    status: String,
    reminder_enabled: i32,
    created_at: String,
    updated_at: String,
}

fn medication_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MedicationRow, rusqlite::Error> {
    Ok(MedicationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        dose: row.get(3)?,
        frequency: row.get(4)?,
        time_slots: row.get(5)?,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        notes: row.get(8)?,
        status: row.get(9)?,
        reminder_enabled: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn medication_from_row(row: MedicationRow) -> Result<Medication, DatabaseError> {
    let time_slots: Vec<DoseSlot> = serde_json::from_str(&row.time_slots)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Invalid time slots: {e}")))?;
    Ok(Medication {
        id: parse_uuid(&row.id)?,
        user_id: parse_uuid(&row.user_id)?,
        name: row.name,
        dose: row.dose,
        frequency: MedicationFrequency::from_str(&row.frequency)?,
        time_slots,
        start_date: parse_date(&row.start_date)?,
        end_date: parse_date(&row.end_date)?,
        notes: row.notes,
        status: MedicationStatus::from_str(&row.status)?,
        reminder_enabled: row.reminder_enabled != 0,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}
