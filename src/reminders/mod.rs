//! The reminder pipeline: schedule generation, the dispatch sweep, missed-dose
//! detection, patient confirmations, and adherence aggregation.
//!
//! Synchronous pieces take a borrowed `Connection`. Sweeps take `&CoreState`
//! and lock the connection only around each synchronous step, so email sends
//! never run with the database held.

pub mod adherence;
pub mod confirm;
pub mod dispatch;
pub mod error;
pub mod missed;
pub mod schedule;
pub mod weekly;

pub use adherence::*;
pub use confirm::*;
pub use dispatch::*;
pub use error::ReminderError;
pub use missed::*;
pub use schedule::*;
pub use weekly::*;

use rusqlite::Connection;
use serde::Serialize;

use crate::db::{self, DatabaseError};
use crate::email::DoseDetails;
use crate::models::enums::RecipientToggle;
use crate::models::{Medication, Notification, Patient};

/// Counts from one pass of a periodic job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Items matched by the job's selection predicate.
    pub considered: usize,
    /// Items the job moved forward (sent, marked missed, summary mailed).
    pub processed: usize,
    /// Items left untouched on purpose (no recipients, owner gone).
    pub skipped: usize,
    /// Items changed by someone else mid-pass.
    pub conflicts: usize,
    pub delivery_failures: usize,
    /// Items that hit a storage error.
    pub errors: usize,
}

/// Patient email first, then opted-in family emails, without duplicates.
pub fn resolve_recipients(
    conn: &Connection,
    patient: &Patient,
    toggle: RecipientToggle,
) -> Result<Vec<String>, DatabaseError> {
    let mut recipients = Vec::new();
    if patient.is_active && !patient.email.trim().is_empty() {
        recipients.push(patient.email.clone());
    }
    for email in db::list_active_recipients(conn, &patient.id, toggle)? {
        if !recipients.iter().any(|r: &String| r.eq_ignore_ascii_case(&email)) {
            recipients.push(email);
        }
    }
    Ok(recipients)
}

/// Everything needed to email about one dose.
pub(crate) struct DoseContext {
    pub details: DoseDetails,
    pub recipients: Vec<String>,
}

/// Join a notification with its patient and medication. `None` when either
/// is gone.
pub(crate) fn load_dose_context(
    conn: &Connection,
    notification: &Notification,
    toggle: RecipientToggle,
) -> Result<Option<DoseContext>, DatabaseError> {
    let Some(patient) = db::get_patient(conn, &notification.user_id)? else {
        return Ok(None);
    };
    let Some(medication) = db::get_medication(conn, &notification.medication_id)? else {
        return Ok(None);
    };
    let recipients = resolve_recipients(conn, &patient, toggle)?;
    Ok(Some(DoseContext {
        details: dose_details(&patient, &medication, notification),
        recipients,
    }))
}

fn dose_details(patient: &Patient, medication: &Medication, notification: &Notification) -> DoseDetails {
    DoseDetails {
        patient_name: patient.name.clone(),
        medication_name: medication.name.clone(),
        dose: medication.dose.clone(),
        scheduled_time: notification.scheduled_time,
    }
}
