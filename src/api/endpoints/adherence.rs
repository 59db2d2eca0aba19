//! Adherence endpoints over the dose ledger.

use axum::extract::{Query, State};
use axum::Extension;
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::api::types::{ok, ApiContext, ApiResult, DateRangeQuery, PatientContext};
use crate::config::DEFAULT_ADHERENCE_DAYS;
use crate::models::{AdherenceLogEntry, AdherenceSummary};
use crate::reminders;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(flatten)]
    pub summary: AdherenceSummary,
}

/// `GET /api/adherence/summary?startDate=&endDate=` (default: last 30 days)
pub async fn summary(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Query(range): Query<DateRangeQuery>,
) -> ApiResult<SummaryResponse> {
    let window = range.window(ctx.core.now(), DEFAULT_ADHERENCE_DAYS)?;
    let conn = ctx.core.db()?;
    let summary = reminders::summarize_adherence(&conn, &caller.patient_id, &window)?;
    Ok(ok(
        "Adherence summary retrieved",
        SummaryResponse {
            start: window.start,
            end: window.end,
            summary,
        },
    ))
}

/// `GET /api/adherence/logs?startDate=&endDate=`
pub async fn logs(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Query(range): Query<DateRangeQuery>,
) -> ApiResult<Vec<AdherenceLogEntry>> {
    let window = range.window(ctx.core.now(), DEFAULT_ADHERENCE_DAYS)?;
    let conn = ctx.core.db()?;
    let entries = reminders::adherence_history(&conn, &caller.patient_id, &window)?;
    Ok(ok("Adherence logs retrieved", entries))
}
