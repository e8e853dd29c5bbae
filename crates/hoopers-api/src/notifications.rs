use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hoopers_db::models::NotificationRow;
use hoopers_db::pagination::clamp_limit;
use hoopers_types::api::{
    NotificationResponse, PageResponse, PushSubscriptionRequest, RemovePushSubscriptionRequest,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    /// `unread=true` narrows to unread entries.
    #[serde(default)]
    pub unread: bool,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
struct MarkAllReadResponse {
    marked: i64,
}

fn to_notification(row: NotificationRow) -> NotificationResponse {
    NotificationResponse {
        id: row.id,
        kind: row.kind,
        actor_id: row.actor_id,
        actor_username: row.actor_username,
        subject_id: row.subject_id,
        read: row.read,
        created_at: row.created_at,
    }
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationsQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.db.list_notifications(
        claims.sub,
        query.unread,
        query.cursor.as_deref(),
        clamp_limit(query.limit),
    )?;
    Ok(Json(PageResponse {
        items: page
            .items
            .into_iter()
            .map(to_notification)
            .collect::<Vec<_>>(),
        next_cursor: page.next,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.mark_notification_read(id, claims.sub)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let marked = state.db.mark_all_notifications_read(claims.sub)?;
    Ok(Json(MarkAllReadResponse { marked }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.delete_notification(id, claims.sub)?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Push subscriptions (storage only; delivery is a separate worker's job) --

/// Browsers re-register on every page load, so registration is an upsert
/// keyed by endpoint.
pub async fn upsert_push_subscription(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PushSubscriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.endpoint.trim().is_empty() {
        return Err(ApiError::BadRequest("endpoint is required".into()));
    }
    state
        .db
        .upsert_push_subscription(claims.sub, &req.endpoint, &req.p256dh, &req.auth)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_push_subscription(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RemovePushSubscriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .remove_push_subscription(claims.sub, &req.endpoint)?;
    Ok(StatusCode::NO_CONTENT)
}
