//! Notification endpoints: the patient's reminder inbox and dose confirmation.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{
    done, ok, parse_id, parse_query_enum, ApiContext, ApiResponse, ApiResult, DateRangeQuery,
    PatientContext,
};
use crate::config::{DEFAULT_ADHERENCE_DAYS, DEFAULT_NOTIFICATION_LIMIT};
use crate::db::{self, NotificationFilter};
use crate::email::{EmailReceipt, TemplateData};
use crate::models::{Notification, NotificationView};
use crate::reminders::{self, ReminderError};

fn views(items: &[Notification]) -> Vec<NotificationView> {
    items.iter().map(NotificationView::from).collect()
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<u32>,
}

/// `GET /api/notifications?status=&type=&limit=`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<NotificationView>> {
    let filter = NotificationFilter {
        status: parse_query_enum(query.status.as_deref(), "status")?,
        kind: parse_query_enum(query.kind.as_deref(), "type")?,
        limit: query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_NOTIFICATION_LIMIT),
    };
    let conn = ctx.core.db()?;
    let items = db::list_notifications(&conn, &caller.patient_id, &filter)?;
    Ok(ok("Notifications retrieved", views(&items)))
}

/// `GET /api/notifications/today`
pub async fn today(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
) -> ApiResult<Vec<NotificationView>> {
    let today = ctx.core.now().date();
    let conn = ctx.core.db()?;
    let items = db::list_notifications_for_day(&conn, &caller.patient_id, today)?;
    Ok(ok("Today's notifications retrieved", views(&items)))
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: u32,
}

/// `GET /api/notifications/unread-count`
pub async fn unread_count(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
) -> ApiResult<CountResponse> {
    let conn = ctx.core.db()?;
    let count = db::count_unread(&conn, &caller.patient_id)?;
    Ok(ok("Unread count retrieved", CountResponse { count }))
}

/// `GET /api/notifications/history?startDate=&endDate=`: confirmed doses only.
pub async fn history(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Query(range): Query<DateRangeQuery>,
) -> ApiResult<Vec<NotificationView>> {
    let window = range.window(ctx.core.now(), DEFAULT_ADHERENCE_DAYS)?;
    let conn = ctx.core.db()?;
    let items = db::list_taken_history(&conn, &caller.patient_id, &window.start, &window.end)?;
    Ok(ok("Medication history retrieved", views(&items)))
}

/// `PUT /api/notifications/:id/taken`
pub async fn mark_taken(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Path(id): Path<String>,
) -> ApiResult<NotificationView> {
    let id = parse_id(&id, "notification")?;
    let conn = ctx.core.db()?;
    let n = reminders::confirm_taken(&conn, &caller.patient_id, &id, ctx.core.now())?;
    Ok(ok("Medication marked as taken", NotificationView::from(&n)))
}

/// `PUT /api/notifications/:id/read`
pub async fn mark_read(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Path(id): Path<String>,
) -> ApiResult<NotificationView> {
    let id = parse_id(&id, "notification")?;
    let conn = ctx.core.db()?;
    let n = reminders::mark_read(&conn, &caller.patient_id, &id)?;
    Ok(ok("Notification marked as read", NotificationView::from(&n)))
}

/// `PUT /api/notifications/:id/dismiss`
pub async fn dismiss(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Path(id): Path<String>,
) -> ApiResult<NotificationView> {
    let id = parse_id(&id, "notification")?;
    let conn = ctx.core.db()?;
    let n = reminders::dismiss(&conn, &caller.patient_id, &id)?;
    Ok(ok("Notification dismissed", NotificationView::from(&n)))
}

#[derive(Serialize)]
pub struct UpdatedResponse {
    pub updated: usize,
}

/// `PUT /api/notifications/mark-all-read`
pub async fn mark_all_read(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
) -> ApiResult<UpdatedResponse> {
    let conn = ctx.core.db()?;
    let updated = reminders::mark_all_read(&conn, &caller.patient_id)?;
    Ok(ok("All notifications marked as read", UpdatedResponse { updated }))
}

/// `DELETE /api/notifications/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&id, "notification")?;
    let conn = ctx.core.db()?;
    reminders::delete_notification(&conn, &caller.patient_id, &id)?;
    Ok(done("Notification deleted"))
}

/// `POST /api/notifications/test-email`: a delivery failure is returned to the caller.
pub async fn test_email(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<PatientContext>,
) -> Result<Json<ApiResponse<EmailReceipt>>, ApiError> {
    let message = TemplateData::Test {
        patient_name: caller.name.clone(),
    }
    .render(vec![caller.email.clone()], &ctx.core.config().app_url);

    let receipt = ctx
        .core
        .delivery()
        .send_now(&message)
        .await
        .map_err(ReminderError::from)?;
    tracing::info!(patient_id = %caller.patient_id, "Test email sent");
    Ok(ok("Test email sent", receipt))
}
