use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, parse_uuid, DatabaseError};
use crate::models::*;

const PATIENT_COLUMNS: &str = "id, name, email, is_active, created_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, email, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            patient.id.to_string(),
            patient.name,
            patient.email,
            patient.is_active as i32,
            format_timestamp(&patient.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id.to_string()],
            patient_row_from_rusqlite,
        )
        .optional()?;
    row.map(patient_from_row).transpose()
}

pub fn get_patient_by_email(conn: &Connection, email: &str) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE email = ?1"),
            params![email],
            patient_row_from_rusqlite,
        )
        .optional()?;
    row.map(patient_from_row).transpose()
}

/// Every patient the weekly summary job should consider.
pub fn list_active_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE is_active = 1 ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map([], patient_row_from_rusqlite)?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row?)?);
    }
    Ok(patients)
}

struct PatientRow {
    id: String,
    name: String,
    email: String,
    is_active: i32,
    created_at: String,
}

fn patient_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<PatientRow, rusqlite::Error> {
    Ok(PatientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        is_active: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: parse_uuid(&row.id)?,
        name: row.name,
        email: row.email,
        is_active: row.is_active != 0,
        created_at: parse_timestamp(&row.created_at)?,
    })
}
