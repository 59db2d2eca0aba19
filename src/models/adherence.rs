use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use super::enums::AdherenceOutcome;

/// Immutable record of one dose's outcome. Outlives the notification that spawned it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdherenceLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub medication_id: Uuid,
    pub scheduled_time: NaiveDateTime,
    pub taken_at: Option<NaiveDateTime>,
    pub status: AdherenceOutcome,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

impl AdherenceLogEntry {
    pub fn taken(
        user_id: Uuid,
        medication_id: Uuid,
        scheduled_time: NaiveDateTime,
        taken_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            medication_id,
            scheduled_time,
            taken_at: Some(taken_at),
            status: AdherenceOutcome::Taken,
            notes: None,
            created_at: taken_at,
        }
    }

    pub fn missed(
        user_id: Uuid,
        medication_id: Uuid,
        scheduled_time: NaiveDateTime,
        detected_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            medication_id,
            scheduled_time,
            taken_at: None,
            status: AdherenceOutcome::Missed,
            notes: Some("Tidak dikonfirmasi dalam masa tenggang".into()),
            created_at: detected_at,
        }
    }

    /// `taken` carries a timestamp, `missed` never does.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            AdherenceOutcome::Taken => self.taken_at.is_some(),
            AdherenceOutcome::Missed => self.taken_at.is_none(),
            AdherenceOutcome::Pending | AdherenceOutcome::Skipped => true,
        }
    }
}

/// Aggregate over a date range of ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdherenceSummary {
    pub total: u32,
    pub taken: u32,
    pub missed: u32,
    pub adherence_rate: u32,
}

impl AdherenceSummary {
    pub fn from_counts(total: u32, taken: u32, missed: u32) -> Self {
        let adherence_rate = if total > 0 {
            ((taken as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };
        Self {
            total,
            taken,
            missed,
            adherence_rate,
        }
    }
}
