//! Patient registration and profile.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ok, ApiContext, ApiResponse, ApiResult, PatientContext};
use crate::models::Patient;
use crate::patients::{self, PatientInput};

/// `POST /api/patients`. Called by the identity service after sign-up.
pub async fn register(
    State(ctx): State<ApiContext>,
    Json(input): Json<PatientInput>,
) -> Result<(StatusCode, Json<ApiResponse<Patient>>), ApiError> {
    let conn = ctx.core.db()?;
    let patient = patients::register_patient(&conn, input, ctx.core.now())?;
    Ok((StatusCode::CREATED, ok("Patient registered", patient)))
}

/// `GET /api/profile`
pub async fn profile(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
) -> ApiResult<Patient> {
    let conn = ctx.core.db()?;
    let patient = patients::get_active_patient(&conn, &caller.patient_id)?;
    Ok(ok("Profile retrieved", patient))
}
