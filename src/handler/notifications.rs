// src/handler/notifications.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::HttpError, handler::live_events, middleware::AuthUser, AppState,
};

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    pub limit: Option<i64>,
}

pub fn notifications_handler() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/live", get(notification_feed))
        .route("/:notification_id/read", put(mark_read))
        .route("/read-all", put(mark_all_read))
        .route("/unread-count", get(get_unread_count))
}

pub async fn list_notifications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<InboxQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let notifications = app_state
        .notification_service
        .list(&auth, query.limit)
        .await?;

    Ok(Json(notifications))
}

pub async fn notification_feed(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    let (snapshot, receiver) = app_state.notification_service.subscribe(&auth).await?;

    let stream = live_events(snapshot, receiver, |_| true);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn mark_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let notification = app_state
        .notification_service
        .mark_read(&auth, notification_id)
        .await?;

    Ok(Json(notification))
}

pub async fn mark_all_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    let flipped = app_state.notification_service.mark_all_read(&auth).await?;

    Ok(Json(json!({
        "status": "success",
        "marked_read": flipped
    })))
}

pub async fn get_unread_count(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    let count = app_state.notification_service.unread_count(&auth).await?;

    Ok(Json(json!({
        "status": "success",
        "unread_count": count
    })))
}
