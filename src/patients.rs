//! Patient records. Identity is issued elsewhere; this module only keeps the
//! name and email the reminder pipeline needs.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db;
use crate::family::is_valid_email;
use crate::models::Patient;
use crate::reminders::ReminderError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientInput {
    /// Id assigned by the identity provider. Generated when absent.
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
}

pub fn register_patient(
    conn: &Connection,
    input: PatientInput,
    now: NaiveDateTime,
) -> Result<Patient, ReminderError> {
    let name = input
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ReminderError::Validation("name is required".into()))?;
    let email = input
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| is_valid_email(e))
        .ok_or_else(|| ReminderError::Validation("a valid email is required".into()))?;

    let patient = Patient {
        id: input.id.unwrap_or_else(Uuid::new_v4),
        name,
        email,
        is_active: true,
        created_at: now,
    };

    let tx = conn.unchecked_transaction()?;
    if db::get_patient(&tx, &patient.id)?.is_some() {
        return Err(ReminderError::Conflict(format!("Patient {} already exists", patient.id)));
    }
    if db::get_patient_by_email(&tx, &patient.email)?.is_some() {
        return Err(ReminderError::Conflict(format!("Email {} is already registered", patient.email)));
    }
    db::insert_patient(&tx, &patient)?;
    tx.commit()?;

    tracing::info!(patient_id = %patient.id, "Patient registered");
    Ok(patient)
}

/// Active patient by id; inactive patients are treated as absent.
pub fn get_active_patient(conn: &Connection, id: &Uuid) -> Result<Patient, ReminderError> {
    db::get_patient(conn, id)?
        .filter(|p| p.is_active)
        .ok_or(ReminderError::NotFound("Patient"))
}
