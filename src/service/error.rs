use thiserror::Error;
use uuid::Uuid;

use crate::error::HttpError;
use axum::http::StatusCode;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("You must be signed in to perform this action")]
    Unauthenticated,

    #[error("User {0} is not allowed to perform this action")]
    Authorization(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Proposal price must be a positive amount")]
    InvalidPrice,

    #[error("Upload failed for {file}: {reason}")]
    Upload { file: String, reason: String },

    #[error("Worker {worker_id} already has a proposal on job {job_id}")]
    DuplicateProposal { job_id: Uuid, worker_id: Uuid },

    #[error("Job {0} is not open for proposals")]
    JobNotOpen(Uuid),

    #[error("Job {0} has already been assigned")]
    AlreadyAssigned(Uuid),

    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("No proposal from worker {worker_id} on job {job_id}")]
    ProposalNotFound { job_id: Uuid, worker_id: Uuid },

    #[error("Notification {0} not found")]
    NotificationNotFound(Uuid),

    #[error("Message {0} not found in this thread")]
    MessageNotFound(Uuid),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Chat for job {0} is not active until a worker is assigned")]
    ChatNotActive(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Unauthenticated => HttpError::unauthorized(error.to_string()),

            ServiceError::Authorization(_) => HttpError::forbidden(error.to_string()),

            ServiceError::Validation(_)
            | ServiceError::InvalidPrice
            | ServiceError::EmptyMessage
            | ServiceError::JobNotOpen(_)
            | ServiceError::ChatNotActive(_) => HttpError::bad_request(error.to_string()),

            ServiceError::DuplicateProposal { .. } | ServiceError::AlreadyAssigned(_) => {
                HttpError::conflict(error.to_string())
            }

            ServiceError::JobNotFound(_)
            | ServiceError::ProposalNotFound { .. }
            | ServiceError::NotificationNotFound(_)
            | ServiceError::MessageNotFound(_) => HttpError::not_found(error.to_string()),

            ServiceError::Upload { .. } => {
                HttpError::new(error.to_string(), StatusCode::BAD_GATEWAY)
            }

            ServiceError::Database(_) => HttpError::server_error(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rule_violations_map_to_conflict() {
        let job_id = Uuid::new_v4();
        let worker_id = Uuid::new_v4();

        let http: HttpError = ServiceError::DuplicateProposal { job_id, worker_id }.into();
        assert_eq!(http.status, StatusCode::CONFLICT);

        let http: HttpError = ServiceError::AlreadyAssigned(job_id).into();
        assert_eq!(http.status, StatusCode::CONFLICT);
    }

    #[test]
    fn auth_failures_map_to_401_and_403() {
        let http: HttpError = ServiceError::Unauthenticated.into();
        assert_eq!(http.status, StatusCode::UNAUTHORIZED);

        let http: HttpError = ServiceError::Authorization(Uuid::new_v4()).into();
        assert_eq!(http.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn bad_input_maps_to_400() {
        let http: HttpError = ServiceError::InvalidPrice.into();
        assert_eq!(http.status, StatusCode::BAD_REQUEST);

        let http: HttpError = ServiceError::EmptyMessage.into();
        assert_eq!(http.status, StatusCode::BAD_REQUEST);

        let http: HttpError = ServiceError::JobNotOpen(Uuid::new_v4()).into();
        assert_eq!(http.status, StatusCode::BAD_REQUEST);
    }
}
