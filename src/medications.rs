//! Medication regimens: validation, persistence, and keeping each
//! regimen's reminder schedule in step with its dosing plan.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::MAX_REGIMEN_DAYS;
use crate::db;
use crate::models::enums::{MedicationFrequency, MedicationStatus};
use crate::models::{DoseSlot, Medication};
use crate::reminders::{write_schedule, ReminderError, ScheduleOutcome};

// ═══════════════════════════════════════════
// Input
// ═══════════════════════════════════════════

/// Create/update body. Every field is optional so the same shape serves as
/// a partial update; creation checks for the required ones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationInput {
    #[serde(rename = "namaObat")]
    pub name: Option<String>,
    #[serde(rename = "dosis")]
    pub dose: Option<String>,
    #[serde(rename = "frekuensi")]
    pub frequency: Option<String>,
    #[serde(rename = "waktuMinum")]
    pub time_slots: Option<Vec<String>>,
    #[serde(rename = "tanggalMulai")]
    pub start_date: Option<String>,
    #[serde(rename = "tanggalSelesai")]
    pub end_date: Option<String>,
    #[serde(rename = "catatan")]
    pub notes: Option<String>,
    pub status: Option<String>,
    pub reminder_enabled: Option<bool>,
}

/// Result of a create or update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationChange {
    pub medication: Medication,
    /// `None` when the update left the schedule untouched.
    pub schedule: Option<ScheduleOutcome>,
}

fn invalid(msg: impl Into<String>) -> ReminderError {
    ReminderError::Validation(msg.into())
}

fn required_text(value: Option<&String>, field: &str) -> Result<String, ReminderError> {
    match value.map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(invalid(format!("{field} is required"))),
    }
}

/// Accepts `YYYY-MM-DD` or an ISO-8601 timestamp (date part used).
pub fn parse_input_date(raw: &str, field: &str) -> Result<NaiveDate, ReminderError> {
    raw.trim()
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or_else(|| invalid(format!("{field} must be a date (YYYY-MM-DD)")))
}

fn parse_slots(raw: &[String]) -> Result<Vec<DoseSlot>, ReminderError> {
    raw.iter()
        .map(|s| {
            DoseSlot::parse(s)
                .ok_or_else(|| invalid(format!("Invalid time slot '{s}', expected HH:MM")))
        })
        .collect()
}

fn parse_frequency(raw: &str) -> Result<MedicationFrequency, ReminderError> {
    MedicationFrequency::from_str(raw.trim())
        .map_err(|_| invalid(format!("Unknown frekuensi '{raw}'")))
}

fn parse_status(raw: &str) -> Result<MedicationStatus, ReminderError> {
    MedicationStatus::from_str(raw.trim()).map_err(|_| invalid(format!("Unknown status '{raw}'")))
}

/// Cross-field rules shared by create and update.
fn check_invariants(med: &Medication) -> Result<(), ReminderError> {
    if med.start_date > med.end_date {
        return Err(invalid("tanggalMulai must not be after tanggalSelesai"));
    }
    if (med.end_date - med.start_date).num_days() >= MAX_REGIMEN_DAYS {
        return Err(invalid(format!(
            "A regimen may span at most {MAX_REGIMEN_DAYS} days"
        )));
    }
    if med.reminder_enabled && med.time_slots.is_empty() {
        return Err(invalid("waktuMinum must list at least one time when reminders are enabled"));
    }
    Ok(())
}

impl MedicationInput {
    /// Validate into a new active medication owned by `user_id`.
    pub fn into_new(self, user_id: Uuid, now: NaiveDateTime) -> Result<Medication, ReminderError> {
        let name = required_text(self.name.as_ref(), "namaObat")?;
        let dose = required_text(self.dose.as_ref(), "dosis")?;
        let frequency = parse_frequency(&required_text(self.frequency.as_ref(), "frekuensi")?)?;
        let start_date = parse_input_date(&required_text(self.start_date.as_ref(), "tanggalMulai")?, "tanggalMulai")?;
        let end_date = parse_input_date(&required_text(self.end_date.as_ref(), "tanggalSelesai")?, "tanggalSelesai")?;
        let time_slots = parse_slots(self.time_slots.as_deref().unwrap_or_default())?;
        let status = match self.status.as_deref() {
            Some(raw) => parse_status(raw)?,
            None => MedicationStatus::Active,
        };

        let med = Medication {
            id: Uuid::new_v4(),
            user_id,
            name,
            dose,
            frequency,
            time_slots,
            start_date,
            end_date,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            status,
            reminder_enabled: self.reminder_enabled.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        check_invariants(&med)?;
        Ok(med)
    }

    /// Overlay the provided fields on `current` and validate the result.
    pub fn apply_to(self, current: &Medication, now: NaiveDateTime) -> Result<Medication, ReminderError> {
        let mut med = current.clone();
        if self.name.is_some() {
            med.name = required_text(self.name.as_ref(), "namaObat")?;
        }
        if self.dose.is_some() {
            med.dose = required_text(self.dose.as_ref(), "dosis")?;
        }
        if let Some(raw) = &self.frequency {
            med.frequency = parse_frequency(raw)?;
        }
        if let Some(raw) = &self.time_slots {
            med.time_slots = parse_slots(raw)?;
        }
        if let Some(raw) = &self.start_date {
            med.start_date = parse_input_date(raw, "tanggalMulai")?;
        }
        if let Some(raw) = &self.end_date {
            med.end_date = parse_input_date(raw, "tanggalSelesai")?;
        }
        if let Some(notes) = self.notes {
            med.notes = Some(notes).filter(|n| !n.trim().is_empty());
        }
        if let Some(raw) = &self.status {
            med.status = parse_status(raw)?;
        }
        if let Some(enabled) = self.reminder_enabled {
            med.reminder_enabled = enabled;
        }
        med.updated_at = now;
        check_invariants(&med)?;
        Ok(med)
    }
}

// ═══════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════

/// Store a medication and its reminders in one transaction.
pub fn create_medication(
    conn: &Connection,
    user_id: &Uuid,
    input: MedicationInput,
    now: NaiveDateTime,
) -> Result<MedicationChange, ReminderError> {
    let med = input.into_new(*user_id, now)?;

    let tx = conn.unchecked_transaction()?;
    db::insert_medication(&tx, &med)?;
    let schedule = write_schedule(&tx, &med, now, false)?;
    tx.commit()?;

    tracing::info!(medication_id = %med.id, reminders = schedule.created, "Medication created");
    Ok(MedicationChange {
        medication: med,
        schedule: Some(schedule),
    })
}

/// Apply a partial update. The reminder schedule is regenerated only when a
/// schedule-relevant field (slots, dates, status, reminder flag) changed.
pub fn update_medication(
    conn: &Connection,
    user_id: &Uuid,
    id: &Uuid,
    input: MedicationInput,
    now: NaiveDateTime,
) -> Result<MedicationChange, ReminderError> {
    let tx = conn.unchecked_transaction()?;
    let current = db::get_medication_for_user(&tx, user_id, id)?.ok_or(ReminderError::NotFound("Medication"))?;
    let med = input.apply_to(&current, now)?;

    db::update_medication(&tx, &med)?;
    let schedule = if med.schedule_differs(&current) {
        Some(write_schedule(&tx, &med, now, true)?)
    } else {
        None
    };
    tx.commit()?;

    tracing::info!(medication_id = %med.id, rescheduled = schedule.is_some(), "Medication updated");
    Ok(MedicationChange { medication: med, schedule })
}

/// Delete a medication. Its reminders go with it; ledger history stays.
pub fn delete_medication(conn: &Connection, user_id: &Uuid, id: &Uuid) -> Result<(), ReminderError> {
    if !db::delete_medication(conn, user_id, id)? {
        return Err(ReminderError::NotFound("Medication"));
    }
    tracing::info!(medication_id = %id, "Medication deleted");
    Ok(())
}

pub fn get_medication(conn: &Connection, user_id: &Uuid, id: &Uuid) -> Result<Medication, ReminderError> {
    db::get_medication_for_user(conn, user_id, id)?.ok_or(ReminderError::NotFound("Medication"))
}

pub fn list_medications(
    conn: &Connection,
    user_id: &Uuid,
    status: Option<&str>,
) -> Result<Vec<Medication>, ReminderError> {
    let status = status.map(parse_status).transpose()?;
    Ok(db::list_medications_for_user(conn, user_id, status)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_state::testing::TestCore;
    use crate::models::enums::NotificationStatus;

    fn ts(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn input(slots: &[&str]) -> MedicationInput {
        MedicationInput {
            name: Some("Rifampisin".into()),
            dose: Some("450 mg".into()),
            frequency: Some("2x sehari".into()),
            time_slots: Some(slots.iter().map(|s| s.to_string()).collect()),
            start_date: Some("2024-01-01".into()),
            end_date: Some("2024-01-02".into()),
            ..MedicationInput::default()
        }
    }

    fn pending_count(conn: &Connection, user: &Uuid) -> usize {
        let filter = db::NotificationFilter {
            status: Some(NotificationStatus::Pending),
            kind: None,
            limit: 1000,
        };
        db::list_notifications(conn, user, &filter).unwrap().len()
    }

    #[test]
    fn create_generates_reminders() {
        let core = TestCore::at("2024-01-01 07:00:00");
        let user = core.add_patient("Siti", "siti@example.com");
        let conn = core.state.db().unwrap();
        let change = create_medication(&conn, &user, input(&["08:00", "20:00"]), ts("2024-01-01 07:00:00")).unwrap();
        assert_eq!(change.schedule.unwrap().created, 4);
        assert_eq!(change.medication.status, MedicationStatus::Active);
        assert_eq!(pending_count(&conn, &user), 4);
    }

    #[test]
    fn malformed_slot_rejected_before_anything_is_stored() {
        let core = TestCore::at("2024-01-01 07:00:00");
        let user = core.add_patient("Siti", "siti@example.com");
        let conn = core.state.db().unwrap();
        let err = create_medication(&conn, &user, input(&["08:00", "8pm"]), ts("2024-01-01 07:00:00")).unwrap_err();
        assert!(matches!(err, ReminderError::Validation(_)));
        assert!(db::list_medications_for_user(&conn, &user, None).unwrap().is_empty());
        assert_eq!(pending_count(&conn, &user), 0);
    }

    #[test]
    fn missing_slots_rejected_when_reminders_enabled() {
        let now = ts("2024-01-01 07:00:00");
        assert!(input(&[]).into_new(Uuid::new_v4(), now).is_err());

        let mut quiet = input(&[]);
        quiet.reminder_enabled = Some(false);
        assert!(quiet.into_new(Uuid::new_v4(), now).is_ok());
    }

    #[test]
    fn inverted_dates_rejected() {
        let mut bad = input(&["08:00"]);
        bad.start_date = Some("2024-02-01".into());
        assert!(matches!(
            bad.into_new(Uuid::new_v4(), ts("2024-01-01 07:00:00")),
            Err(ReminderError::Validation(_))
        ));
    }

    #[test]
    fn regimen_length_is_capped() {
        let now = ts("2024-01-01 07:00:00");
        let mut endless = input(&["08:00"]);
        endless.end_date = Some("9999-12-31".into());
        assert!(matches!(
            endless.into_new(Uuid::new_v4(), now),
            Err(ReminderError::Validation(_))
        ));

        let mut two_years = input(&["08:00"]);
        two_years.end_date = Some("2025-12-31".into());
        assert!(two_years.into_new(Uuid::new_v4(), now).is_ok());
    }

    #[test]
    fn iso_timestamps_accepted_as_dates() {
        let mut iso = input(&["08:00"]);
        iso.start_date = Some("2024-01-01T00:00:00.000Z".into());
        let med = iso.into_new(Uuid::new_v4(), ts("2024-01-01 07:00:00")).unwrap();
        assert_eq!(med.start_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn unknown_frequency_rejected() {
        let mut bad = input(&["08:00"]);
        bad.frequency = Some("4x sehari".into());
        assert!(bad.into_new(Uuid::new_v4(), ts("2024-01-01 07:00:00")).is_err());
    }

    #[test]
    fn adding_a_slot_regenerates() {
        let core = TestCore::at("2024-01-01 07:00:00");
        let user = core.add_patient("Siti", "siti@example.com");
        let conn = core.state.db().unwrap();
        let mut one_day = input(&["08:00"]);
        one_day.end_date = Some("2024-01-01".into());
        let created = create_medication(&conn, &user, one_day, ts("2024-01-01 07:00:00")).unwrap();
        assert_eq!(pending_count(&conn, &user), 1);

        let patch = MedicationInput {
            time_slots: Some(vec!["08:00".into(), "20:00".into()]),
            ..MedicationInput::default()
        };
        let change = update_medication(&conn, &user, &created.medication.id, patch, ts("2024-01-01 07:30:00")).unwrap();
        assert_eq!(change.schedule, Some(ScheduleOutcome { purged: 1, created: 2 }));
        assert_eq!(pending_count(&conn, &user), 2);
    }

    #[test]
    fn cosmetic_update_keeps_schedule() {
        let core = TestCore::at("2024-01-01 07:00:00");
        let user = core.add_patient("Siti", "siti@example.com");
        let conn = core.state.db().unwrap();
        let created = create_medication(&conn, &user, input(&["08:00"]), ts("2024-01-01 07:00:00")).unwrap();

        let patch = MedicationInput {
            notes: Some("Minum setelah makan".into()),
            ..MedicationInput::default()
        };
        let change = update_medication(&conn, &user, &created.medication.id, patch, ts("2024-01-01 07:10:00")).unwrap();
        assert!(change.schedule.is_none());
        assert_eq!(change.medication.notes.as_deref(), Some("Minum setelah makan"));
    }

    #[test]
    fn completing_a_medication_purges_pending() {
        let core = TestCore::at("2024-01-01 07:00:00");
        let user = core.add_patient("Siti", "siti@example.com");
        let conn = core.state.db().unwrap();
        let created = create_medication(&conn, &user, input(&["08:00", "20:00"]), ts("2024-01-01 07:00:00")).unwrap();

        let patch = MedicationInput {
            status: Some("selesai".into()),
            ..MedicationInput::default()
        };
        let change = update_medication(&conn, &user, &created.medication.id, patch, ts("2024-01-01 07:10:00")).unwrap();
        assert_eq!(change.schedule, Some(ScheduleOutcome { purged: 4, created: 0 }));
        assert_eq!(pending_count(&conn, &user), 0);
    }

    #[test]
    fn update_and_delete_are_owner_scoped() {
        let core = TestCore::at("2024-01-01 07:00:00");
        let user = core.add_patient("Siti", "siti@example.com");
        let stranger = core.add_patient("Andi", "andi@example.com");
        let conn = core.state.db().unwrap();
        let created = create_medication(&conn, &user, input(&["08:00"]), ts("2024-01-01 07:00:00")).unwrap();
        let id = created.medication.id;

        assert!(matches!(
            update_medication(&conn, &stranger, &id, MedicationInput::default(), ts("2024-01-01 07:10:00")),
            Err(ReminderError::NotFound(_))
        ));
        assert!(matches!(delete_medication(&conn, &stranger, &id), Err(ReminderError::NotFound(_))));
        assert!(matches!(get_medication(&conn, &stranger, &id), Err(ReminderError::NotFound(_))));

        delete_medication(&conn, &user, &id).unwrap();
        assert_eq!(pending_count(&conn, &user), 0);
    }

    #[test]
    fn list_filters_by_wire_status() {
        let core = TestCore::at("2024-01-01 07:00:00");
        let user = core.add_patient("Siti", "siti@example.com");
        let conn = core.state.db().unwrap();
        create_medication(&conn, &user, input(&["08:00"]), ts("2024-01-01 07:00:00")).unwrap();
        assert_eq!(list_medications(&conn, &user, Some("aktif")).unwrap().len(), 1);
        assert!(list_medications(&conn, &user, Some("selesai")).unwrap().is_empty());
        assert!(list_medications(&conn, &user, Some("bogus")).is_err());
    }
}
