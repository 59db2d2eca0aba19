//! Family members who follow a patient's treatment.
//!
//! Inviting a member sends one welcome email. The email is best-effort and
//! never fails the invitation.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::core_state::CoreState;
use crate::db::{self, DatabaseError};
use crate::email::TemplateData;
use crate::models::enums::FamilyRelation;
use crate::models::FamilyMember;
use crate::reminders::ReminderError;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub relation: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "notifyAlerts")]
    pub notify_dose_alerts: Option<bool>,
    pub notify_weekly_summary: Option<bool>,
}

pub fn is_valid_email(raw: &str) -> bool {
    EMAIL_PATTERN.is_match(raw.trim())
}

fn invalid(msg: impl Into<String>) -> ReminderError {
    ReminderError::Validation(msg.into())
}

fn parse_email(raw: &str) -> Result<String, ReminderError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(invalid(format!("Invalid email address '{raw}'")));
    }
    Ok(email)
}

fn parse_relation(raw: &str) -> Result<FamilyRelation, ReminderError> {
    FamilyRelation::from_str(raw.trim()).map_err(|_| invalid(format!("Unknown relation '{raw}'")))
}

fn duplicate_to_conflict(err: DatabaseError) -> ReminderError {
    match err {
        DatabaseError::ConstraintViolation(msg) => ReminderError::Conflict(msg),
        other => ReminderError::Database(other),
    }
}

impl FamilyInput {
    pub fn into_new(self, user_id: Uuid, now: NaiveDateTime) -> Result<FamilyMember, ReminderError> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| invalid("name is required"))?;
        let email = parse_email(self.email.as_deref().ok_or_else(|| invalid("email is required"))?)?;
        let relation = match self.relation.as_deref() {
            Some(raw) => parse_relation(raw)?,
            None => FamilyRelation::Other,
        };

        Ok(FamilyMember {
            id: Uuid::new_v4(),
            user_id,
            name,
            email,
            relation,
            phone: self.phone.filter(|p| !p.trim().is_empty()),
            is_active: true,
            notify_dose_alerts: self.notify_dose_alerts.unwrap_or(true),
            notify_weekly_summary: self.notify_weekly_summary.unwrap_or(true),
            created_at: now,
        })
    }

    pub fn apply_to(self, current: &FamilyMember) -> Result<FamilyMember, ReminderError> {
        let mut member = current.clone();
        if let Some(name) = self.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(invalid("name must not be empty"));
            }
            member.name = name;
        }
        if let Some(raw) = &self.email {
            member.email = parse_email(raw)?;
        }
        if let Some(raw) = &self.relation {
            member.relation = parse_relation(raw)?;
        }
        if let Some(phone) = self.phone {
            member.phone = Some(phone).filter(|p| !p.trim().is_empty());
        }
        if let Some(on) = self.notify_dose_alerts {
            member.notify_dose_alerts = on;
        }
        if let Some(on) = self.notify_weekly_summary {
            member.notify_weekly_summary = on;
        }
        Ok(member)
    }
}

/// Store a new member, then send the welcome email best-effort.
pub async fn invite_family_member(
    state: &CoreState,
    user_id: &Uuid,
    input: FamilyInput,
) -> Result<FamilyMember, ReminderError> {
    let now = state.now();
    let member = input.into_new(*user_id, now)?;
    let patient_name = {
        let conn = state.db()?;
        let patient = db::get_patient(&conn, user_id)?.ok_or(ReminderError::NotFound("Patient"))?;
        db::insert_family_member(&conn, &member).map_err(duplicate_to_conflict)?;
        patient.name
    };
    tracing::info!(family_member_id = %member.id, "Family member added");

    let message = TemplateData::FamilyWelcome {
        member_name: member.name.clone(),
        patient_name,
    }
    .render(vec![member.email.clone()], &state.config().app_url);
    state.delivery().deliver(&message, now).await;

    Ok(member)
}

pub fn update_family_member(
    conn: &Connection,
    user_id: &Uuid,
    id: &Uuid,
    input: FamilyInput,
) -> Result<FamilyMember, ReminderError> {
    let current = db::get_active_family_member(conn, user_id, id)?.ok_or(ReminderError::NotFound("Family member"))?;
    let member = input.apply_to(&current)?;
    db::update_family_member(conn, &member).map_err(duplicate_to_conflict)?;
    Ok(member)
}

/// Soft delete: the member stops receiving email, the row stays.
pub fn remove_family_member(conn: &Connection, user_id: &Uuid, id: &Uuid) -> Result<(), ReminderError> {
    if !db::deactivate_family_member(conn, user_id, id)? {
        return Err(ReminderError::NotFound("Family member"));
    }
    tracing::info!(family_member_id = %id, "Family member deactivated");
    Ok(())
}

pub fn list_family_members(conn: &Connection, user_id: &Uuid) -> Result<Vec<FamilyMember>, ReminderError> {
    Ok(db::list_active_family_members(conn, user_id)?)
}
