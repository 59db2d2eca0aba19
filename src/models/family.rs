use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use super::enums::FamilyRelation;

/// Secondary recipient tied to one patient. Soft-deleted via `is_active`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub relation: FamilyRelation,
    pub phone: Option<String>,
    pub is_active: bool,
    #[serde(rename = "notifyAlerts")]
    pub notify_dose_alerts: bool,
    pub notify_weekly_summary: bool,
    pub created_at: NaiveDateTime,
}
