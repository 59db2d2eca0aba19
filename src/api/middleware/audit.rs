//! Audit logging middleware.
//!
//! Logs every API request with patient id, method, path, and response
//! status. Runs innermost (after auth has injected `PatientContext`).

use axum::extract::OriginalUri;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, PatientContext};

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    // Nested routers see the path with the `/api` prefix stripped.
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let patient_id = req.extensions().get::<PatientContext>().map(|p| p.patient_id);

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        let status = response.status().as_u16();
        ctx.core
            .log_access(patient_id, &format!("{method} {path}"), &format!("status:{status}"));
    }

    response
}
