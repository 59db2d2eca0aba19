//! Liveness check.

use axum::extract::State;
use serde::Serialize;

use crate::api::types::{ok, ApiContext, ApiResult};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    /// Best-effort emails that failed and were parked.
    pub dead_letters: usize,
}

/// `GET /api/health`
pub async fn check(State(ctx): State<ApiContext>) -> ApiResult<HealthResponse> {
    let database = ctx
        .core
        .db()
        .map(|conn| conn.query_row("SELECT 1", [], |_| Ok(())).is_ok())
        .unwrap_or(false);

    Ok(ok(
        "TabbyCare API is running",
        HealthResponse {
            status: if database { "ok" } else { "degraded" },
            version: crate::config::APP_VERSION,
            database,
            dead_letters: ctx.core.delivery().dead_letter_count(),
        },
    ))
}
