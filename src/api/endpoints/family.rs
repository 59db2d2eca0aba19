//! Family member endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{done, ok, parse_id, ApiContext, ApiResponse, ApiResult, PatientContext};
use crate::family::{self, FamilyInput};
use crate::models::FamilyMember;

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
) -> ApiResult<Vec<FamilyMember>> {
    let conn = ctx.core.db()?;
    let members = family::list_family_members(&conn, &caller.patient_id)?;
    Ok(ok("Family members retrieved", members))
}

/// `POST /api/family`: stores the member, then sends the welcome email.
pub async fn invite(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Json(input): Json<FamilyInput>,
) -> Result<(StatusCode, Json<ApiResponse<FamilyMember>>), ApiError> {
    let member = family::invite_family_member(&ctx.core, &caller.patient_id, input).await?;
    Ok((StatusCode::CREATED, ok("Family member added", member)))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Path(id): Path<String>,
    Json(input): Json<FamilyInput>,
) -> ApiResult<FamilyMember> {
    let id = parse_id(&id, "family member")?;
    let conn = ctx.core.db()?;
    let member = family::update_family_member(&conn, &caller.patient_id, &id, input)?;
    Ok(ok("Family member updated", member))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&id, "family member")?;
    let conn = ctx.core.db()?;
    family::remove_family_member(&conn, &caller.patient_id, &id)?;
    Ok(done("Family member removed"))
}
