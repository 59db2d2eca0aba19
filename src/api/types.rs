//! Shared types for the HTTP layer.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::medications::parse_input_date;
use crate::reminders::AdherenceWindow;

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Authenticated caller, injected by the auth middleware.
#[derive(Debug, Clone)]
pub struct PatientContext {
    pub patient_id: Uuid,
    pub name: String,
    pub email: String,
}

// ═══════════════════════════════════════════════════════════
// Response envelope
// ═══════════════════════════════════════════════════════════

/// Success envelope: `{ success: true, message, data }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        message: message.into(),
        data: Some(data),
    })
}

/// Envelope with no payload (deletes).
pub fn done(message: impl Into<String>) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        success: true,
        message: message.into(),
        data: None,
    })
}

// ═══════════════════════════════════════════════════════════
// Request helpers
// ═══════════════════════════════════════════════════════════

pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {what} ID")))
}

/// Parse an optional enum-valued query parameter.
pub fn parse_query_enum<T: FromStr>(raw: Option<&str>, param: &str) -> Result<Option<T>, ApiError> {
    raw.filter(|v| !v.is_empty())
        .map(|v| {
            T::from_str(v).map_err(|_| ApiError::BadRequest(format!("Unknown {param} '{v}'")))
        })
        .transpose()
}

/// `?startDate=&endDate=` with inclusive calendar days.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl DateRangeQuery {
    pub fn window(&self, now: NaiveDateTime, default_days: i64) -> Result<AdherenceWindow, ApiError> {
        let start = self
            .start_date
            .as_deref()
            .map(|d| parse_input_date(d, "startDate"))
            .transpose()?;
        let end = self
            .end_date
            .as_deref()
            .map(|d| parse_input_date(d, "endDate"))
            .transpose()?;
        Ok(AdherenceWindow::resolve(start, end, now, default_days)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::NotificationStatus;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-01-20 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn explicit_range_is_inclusive() {
        let query = DateRangeQuery {
            start_date: Some("2024-01-01".into()),
            end_date: Some("2024-01-07".into()),
        };
        let window = query.window(now(), 30).unwrap();
        assert_eq!(window.start.to_string(), "2024-01-01 00:00:00");
        assert_eq!(window.end.to_string(), "2024-01-08 00:00:00");
    }

    #[test]
    fn empty_range_uses_trailing_days() {
        let window = DateRangeQuery::default().window(now(), 30).unwrap();
        assert_eq!(window.start.to_string(), "2023-12-21 12:00:00");
        assert_eq!(window.end, now());
    }

    #[test]
    fn malformed_date_is_bad_request() {
        let query = DateRangeQuery {
            start_date: Some("yesterday".into()),
            end_date: None,
        };
        assert!(matches!(query.window(now(), 30), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn query_enum_parsing() {
        let parsed: Option<NotificationStatus> = parse_query_enum(Some("sent"), "status").unwrap();
        assert_eq!(parsed, Some(NotificationStatus::Sent));
        assert!(parse_query_enum::<NotificationStatus>(Some("bogus"), "status").is_err());
        assert_eq!(parse_query_enum::<NotificationStatus>(Some(""), "status").unwrap(), None);
    }
}
