use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, parse_uuid, DatabaseError};
use crate::models::enums::*;
use crate::models::*;

const FAMILY_COLUMNS: &str = "id, user_id, name, email, relation, phone, is_active,
    notify_dose_alerts, notify_weekly_summary, created_at";

/// The partial unique index allows one active member per email.
fn duplicate_email(e: rusqlite::Error, email: &str) -> DatabaseError {
    match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
            DatabaseError::ConstraintViolation(format!("{email} is already an active family member"))
        }
        other => DatabaseError::Sqlite(other),
    }
}

pub fn insert_family_member(conn: &Connection, member: &FamilyMember) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO family_members (id, user_id, name, email, relation, phone, is_active,
         notify_dose_alerts, notify_weekly_summary, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            member.id.to_string(),
            member.user_id.to_string(),
            member.name,
            member.email,
            member.relation.as_str(),
            member.phone,
            member.is_active as i32,
            member.notify_dose_alerts as i32,
            member.notify_weekly_summary as i32,
            format_timestamp(&member.created_at),
        ],
    )
    .map_err(|e| duplicate_email(e, &member.email))?;
    Ok(())
}

pub fn update_family_member(conn: &Connection, member: &FamilyMember) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE family_members SET name = ?1, email = ?2, relation = ?3, phone = ?4,
         notify_dose_alerts = ?5, notify_weekly_summary = ?6
         WHERE id = ?7 AND user_id = ?8 AND is_active = 1",
        params![
            member.name,
            member.email,
            member.relation.as_str(),
            member.phone,
            member.notify_dose_alerts as i32,
            member.notify_weekly_summary as i32,
            member.id.to_string(),
            member.user_id.to_string(),
        ],
    )
    .map_err(|e| duplicate_email(e, &member.email))?;
    Ok(())
}

/// Soft delete. Returns false when no active member matched.
pub fn deactivate_family_member(conn: &Connection, user_id: &Uuid, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE family_members SET is_active = 0 WHERE id = ?1 AND user_id = ?2 AND is_active = 1",
        params![id.to_string(), user_id.to_string()],
    )?;
    Ok(changed > 0)
}

pub fn get_active_family_member(
    conn: &Connection,
    user_id: &Uuid,
    id: &Uuid,
) -> Result<Option<FamilyMember>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {FAMILY_COLUMNS} FROM family_members
                 WHERE id = ?1 AND user_id = ?2 AND is_active = 1"
            ),
            params![id.to_string(), user_id.to_string()],
            family_row_from_rusqlite,
        )
        .optional()?;
    row.map(family_from_row).transpose()
}

pub fn list_active_family_members(conn: &Connection, user_id: &Uuid) -> Result<Vec<FamilyMember>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FAMILY_COLUMNS} FROM family_members
         WHERE user_id = ?1 AND is_active = 1
         ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map(params![user_id.to_string()], family_row_from_rusqlite)?;

    let mut members = Vec::new();
    for row in rows {
        members.push(family_from_row(row?)?);
    }
    Ok(members)
}

/// Emails of active family members who opted into `toggle`.
pub fn list_active_recipients(
    conn: &Connection,
    user_id: &Uuid,
    toggle: RecipientToggle,
) -> Result<Vec<String>, DatabaseError> {
    let column = match toggle {
        RecipientToggle::DoseAlerts => "notify_dose_alerts",
        RecipientToggle::WeeklySummary => "notify_weekly_summary",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT email FROM family_members
         WHERE user_id = ?1 AND is_active = 1 AND {column} = 1
         ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map(params![user_id.to_string()], |row| row.get::<_, String>(0))?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

struct FamilyRow {
    id: String,
    user_id: String,
    name: String,
    email: String,
    relation: String,
    phone: Option<String>,
    is_active: i32,
    notify_dose_alerts: i32,
    notify_weekly_summary: i32,
    created_at: String,
}

fn family_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<FamilyRow, rusqlite::Error> {
    Ok(FamilyRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        relation: row.get(4)?,
        phone: row.get(5)?,
        is_active: row.get(6)?,
        notify_dose_alerts: row.get(7)?,
        notify_weekly_summary: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn family_from_row(row: FamilyRow) -> Result<FamilyMember, DatabaseError> {
    Ok(FamilyMember {
        id: parse_uuid(&row.id)?,
        user_id: parse_uuid(&row.user_id)?,
        name: row.name,
        email: row.email,
        relation: FamilyRelation::from_str(&row.relation)?,
        phone: row.phone,
        is_active: row.is_active != 0,
        notify_dose_alerts: row.notify_dose_alerts != 0,
        notify_weekly_summary: row.notify_weekly_summary != 0,
        created_at: parse_timestamp(&row.created_at)?,
    })
}
