use std::sync::Arc;

use axum::{
    extract::Path,
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, put},
    Extension, Json, Router,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::chatdtos::SendMessageDto,
    dtos::jobdtos::ApiResponse,
    error::HttpError,
    handler::live_events,
    middleware::AuthUser,
    AppState,
};

pub fn chat_handler() -> Router {
    Router::new()
        .route("/:job_id/messages", get(get_thread).post(send_message))
        .route("/:job_id/messages/live", get(message_feed))
        .route("/:job_id/read", put(mark_thread_read))
        .route("/:job_id/unread-count", get(get_unread_count))
}

pub async fn send_message(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<SendMessageDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let message = app_state
        .chat_service
        .send_message(&auth, job_id, body.text, body.reply_to)
        .await?;

    Ok(Json(ApiResponse::success("Message sent", message)))
}

pub async fn get_thread(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let messages = app_state.chat_service.get_thread(&auth, job_id).await?;
    Ok(Json(messages))
}

/// Replays the full thread as a "snapshot" event, then streams each new or
/// newly-read message as a "change" event.
pub async fn message_feed(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let (snapshot, receiver) = app_state.chat_service.subscribe(&auth, job_id).await?;

    let stream = live_events(snapshot, receiver, |_| true);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn mark_thread_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let flipped = app_state
        .chat_service
        .mark_thread_read(&auth, job_id)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "marked_read": flipped
    })))
}

pub async fn get_unread_count(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let count = app_state.chat_service.unread_count(&auth, job_id).await?;

    Ok(Json(json!({
        "status": "success",
        "unread_count": count
    })))
}
