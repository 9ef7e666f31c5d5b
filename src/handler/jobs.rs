use std::sync::Arc;

use axum::{
    extract::Path,
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post, put},
    Extension, Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::jobdtos::*,
    error::HttpError,
    handler::live_events,
    middleware::AuthUser,
    service::storage_service::MediaUpload,
    AppState,
};

pub fn jobs_handler() -> Router {
    Router::new()
        .route("/", post(create_job))
        .route("/open", get(list_open_jobs))
        .route("/open/live", get(open_jobs_feed))
        .route("/mine", get(list_my_jobs))
        .route("/mine/live", get(my_jobs_feed))
        .route("/assigned", get(list_assigned_jobs))
        .route("/assigned/live", get(assigned_jobs_feed))
        .route("/:job_id", get(get_job))
        .route("/:job_id/proposals", post(submit_proposal))
        .route("/:job_id/accept", put(accept_proposal))
}

pub async fn create_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let mut media = Vec::with_capacity(body.media.len());
    for file in body.media {
        let bytes = general_purpose::STANDARD.decode(file.data.as_bytes()).map_err(|_| {
            HttpError::bad_request(format!("{} is not valid base64 data", file.file_name))
        })?;
        media.push(MediaUpload {
            file_name: file.file_name,
            content_type: file.content_type,
            bytes,
        });
    }

    let record = app_state
        .job_service
        .create_job(&auth, body.description, media)
        .await?;

    Ok(Json(ApiResponse::success("Job created successfully", record)))
}

pub async fn get_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(_auth): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let record = app_state.job_service.get_job(job_id).await?;
    Ok(Json(record))
}

pub async fn list_open_jobs(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(_auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    let records = app_state.job_service.list_open_jobs().await?;
    Ok(Json(records))
}

pub async fn list_my_jobs(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    let records = app_state.job_service.list_jobs_for_owner(auth.id).await?;
    Ok(Json(records))
}

pub async fn list_assigned_jobs(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    let records = app_state.job_service.list_jobs_for_worker(auth.id).await?;
    Ok(Json(records))
}

/// Live open-jobs browse feed. Deltas are all job changes: a job whose
/// status leaves `analyzing` is still delivered so consumers can drop it.
pub async fn open_jobs_feed(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(_auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    let receiver = app_state.job_service.job_feed();
    let snapshot = app_state.job_service.list_open_jobs().await?;

    let stream = live_events(snapshot, receiver, |_| true);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn my_jobs_feed(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    let receiver = app_state.job_service.job_feed();
    let snapshot = app_state.job_service.list_jobs_for_owner(auth.id).await?;

    let owner_id = auth.id;
    let stream = live_events(snapshot, receiver, move |record| {
        record.job.owner_id == owner_id
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn assigned_jobs_feed(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    let receiver = app_state.job_service.job_feed();
    let snapshot = app_state.job_service.list_jobs_for_worker(auth.id).await?;

    let worker_id = auth.id;
    let stream = live_events(snapshot, receiver, move |record| {
        record.involves_worker(worker_id)
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn submit_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<SubmitProposalDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let record = app_state
        .job_service
        .submit_proposal(
            &auth,
            job_id,
            body.price,
            body.description,
            body.duration,
            body.worker_count,
        )
        .await?;

    Ok(Json(ApiResponse::success("Proposal sent to the client", record)))
}

pub async fn accept_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<AcceptProposalDto>,
) -> Result<impl IntoResponse, HttpError> {
    let record = app_state
        .job_service
        .accept_proposal(&auth, job_id, body.worker_id)
        .await?;

    Ok(Json(ApiResponse::success("Worker assigned", record)))
}
