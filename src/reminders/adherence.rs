//! Adherence aggregation over the ledger. Read-only.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use super::ReminderError;
use crate::db;
use crate::models::{AdherenceLogEntry, AdherenceSummary};

/// Half-open `[start, end)` window over scheduled dose times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdherenceWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl AdherenceWindow {
    /// The `days` days leading up to `now`.
    pub fn trailing(now: NaiveDateTime, days: i64) -> Self {
        Self {
            start: now - Duration::days(days),
            end: now,
        }
    }

    /// Whole calendar days, both ends inclusive.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self, ReminderError> {
        if start > end {
            return Err(ReminderError::Validation(
                "startDate must not be after endDate".into(),
            ));
        }
        let start = start.and_hms_opt(0, 0, 0).unwrap_or_default();
        let end = end.and_hms_opt(0, 0, 0).unwrap_or_default() + Duration::days(1);
        Ok(Self { start, end })
    }

    /// Explicit dates when both are given, otherwise the trailing window.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        now: NaiveDateTime,
        default_days: i64,
    ) -> Result<Self, ReminderError> {
        match (start, end) {
            (Some(start), Some(end)) => Self::from_dates(start, end),
            (Some(start), None) => Self::from_dates(start, now.date()),
            (None, Some(end)) => Self::from_dates(end - Duration::days(default_days), end),
            (None, None) => Ok(Self::trailing(now, default_days)),
        }
    }
}

/// `{total, taken, missed, adherenceRate}` for one patient over `window`.
pub fn summarize_adherence(
    conn: &Connection,
    user_id: &Uuid,
    window: &AdherenceWindow,
) -> Result<AdherenceSummary, ReminderError> {
    let (total, taken, missed) = db::count_adherence_outcomes(conn, user_id, &window.start, &window.end)?;
    Ok(AdherenceSummary::from_counts(total, taken, missed))
}

pub fn adherence_history(
    conn: &Connection,
    user_id: &Uuid,
    window: &AdherenceWindow,
) -> Result<Vec<AdherenceLogEntry>, ReminderError> {
    Ok(db::list_adherence_entries(conn, user_id, &window.start, &window.end)?)
}
