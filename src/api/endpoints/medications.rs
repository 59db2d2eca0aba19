//! Medication endpoints.
//!
//! - `GET /api/medications?status=`: the caller's regimens
//! - `POST /api/medications`: create and schedule reminders
//! - `GET /api/medications/:id`
//! - `PUT /api/medications/:id`: partial update, reschedules when the plan changed
//! - `DELETE /api/medications/:id`: removes the regimen and its reminders

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{done, ok, parse_id, ApiContext, ApiResponse, ApiResult, PatientContext};
use crate::medications::{self, MedicationChange, MedicationInput};
use crate::models::Medication;

#[derive(Deserialize)]
pub struct MedListQuery {
    pub status: Option<String>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Query(query): Query<MedListQuery>,
) -> ApiResult<Vec<Medication>> {
    let conn = ctx.core.db()?;
    let status = query.status.as_deref().filter(|s| !s.is_empty());
    let meds = medications::list_medications(&conn, &caller.patient_id, status)?;
    Ok(ok("Medications retrieved", meds))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Json(input): Json<MedicationInput>,
) -> Result<(StatusCode, Json<ApiResponse<MedicationChange>>), ApiError> {
    let conn = ctx.core.db()?;
    let change = medications::create_medication(&conn, &caller.patient_id, input, ctx.core.now())?;
    Ok((StatusCode::CREATED, ok("Medication added", change)))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Path(id): Path<String>,
) -> ApiResult<Medication> {
    let id = parse_id(&id, "medication")?;
    let conn = ctx.core.db()?;
    let med = medications::get_medication(&conn, &caller.patient_id, &id)?;
    Ok(ok("Medication retrieved", med))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Path(id): Path<String>,
    Json(input): Json<MedicationInput>,
) -> ApiResult<MedicationChange> {
    let id = parse_id(&id, "medication")?;
    let conn = ctx.core.db()?;
    let change = medications::update_medication(&conn, &caller.patient_id, &id, input, ctx.core.now())?;
    Ok(ok("Medication updated", change))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&id, "medication")?;
    let conn = ctx.core.db()?;
    medications::delete_medication(&conn, &caller.patient_id, &id)?;
    Ok(done("Medication deleted"))
}
