//! Caller identity middleware.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! patient id in `X-Patient-Id`. This layer checks that the id names an
//! active patient and injects `PatientContext` for downstream handlers.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PatientContext};
use crate::db;

pub const PATIENT_ID_HEADER: &str = "X-Patient-Id";

/// Require a known, active patient.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_patient(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_patient_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_patient_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let patient_id = req
        .headers()
        .get(PATIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or(ApiError::Unauthorized)?;

    let patient = {
        let conn = ctx.core.db()?;
        db::get_patient(&conn, &patient_id)?
    }; // MutexGuard dropped here, before any .await

    let patient = match patient {
        Some(p) if p.is_active => p,
        _ => {
            tracing::warn!(%patient_id, "Rejected request for unknown or inactive patient");
            return Err(ApiError::Unauthorized);
        }
    };

    req.extensions_mut().insert(PatientContext {
        patient_id: patient.id,
        name: patient.name,
        email: patient.email,
    });

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));
    Ok(response)
}
