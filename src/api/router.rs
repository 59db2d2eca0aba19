//! API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//!
//! Middleware stack on protected routes (outermost → innermost):
//! CORS → Extension → Auth → Audit → Handler

use std::sync::Arc;

use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/profile", get(endpoints::patients::profile))
        .route(
            "/medications",
            get(endpoints::medications::list).post(endpoints::medications::create),
        )
        .route(
            "/medications/:id",
            get(endpoints::medications::detail)
                .put(endpoints::medications::update)
                .delete(endpoints::medications::remove),
        )
        .route("/notifications", get(endpoints::notifications::list))
        .route("/notifications/today", get(endpoints::notifications::today))
        .route(
            "/notifications/unread-count",
            get(endpoints::notifications::unread_count),
        )
        .route("/notifications/history", get(endpoints::notifications::history))
        .route(
            "/notifications/mark-all-read",
            put(endpoints::notifications::mark_all_read),
        )
        .route(
            "/notifications/test-email",
            post(endpoints::notifications::test_email),
        )
        .route(
            "/notifications/:id",
            axum::routing::delete(endpoints::notifications::remove),
        )
        .route(
            "/notifications/:id/taken",
            put(endpoints::notifications::mark_taken),
        )
        .route("/notifications/:id/read", put(endpoints::notifications::mark_read))
        .route(
            "/notifications/:id/dismiss",
            put(endpoints::notifications::dismiss),
        )
        .route("/adherence/summary", get(endpoints::adherence::summary))
        .route("/adherence/logs", get(endpoints::adherence::logs))
        .route(
            "/family",
            get(endpoints::family::list).post(endpoints::family::invite),
        )
        .route(
            "/family/:id",
            put(endpoints::family::update).delete(endpoints::family::remove),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_patient))
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/patients", post(endpoints::patients::register))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(cors_layer())
}

/// The web client is served from a different origin.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-patient-id")])
}
