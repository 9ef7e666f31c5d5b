// service/job_service.rs
use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    db::{
        db::DBClient,
        jobdb::{AcceptOutcome, JobExt},
        userdb::UserExt,
    },
    middleware::AuthUser,
    models::{jobmodel::*, usermodel::UserRole},
    service::{
        error::ServiceError,
        notification_service::NotificationService,
        storage_service::{upload_all, MediaUpload, ObjectStore},
    },
};

#[derive(Clone)]
pub struct JobService {
    db_client: Arc<DBClient>,
    storage: Arc<dyn ObjectStore>,
    notification_service: Arc<NotificationService>,
}

impl JobService {
    pub fn new(
        db_client: Arc<DBClient>,
        storage: Arc<dyn ObjectStore>,
        notification_service: Arc<NotificationService>,
    ) -> Self {
        Self {
            db_client,
            storage,
            notification_service,
        }
    }

    /// Create a job: every media file is uploaded before the record is
    /// written, so a failed upload never leaves a partial job behind. The AI
    /// annotation is *not* invoked here; the dispatcher observes the
    /// creation event.
    pub async fn create_job(
        &self,
        auth: &AuthUser,
        description: String,
        media: Vec<MediaUpload>,
    ) -> Result<JobRecord, ServiceError> {
        validate_job_request(&description, &media)?;

        let media_urls = upload_all(self.storage.as_ref(), auth.id, media).await?;

        let record = self
            .db_client
            .create_job(
                auth.id,
                auth.email.clone(),
                description.trim().to_string(),
                media_urls,
            )
            .await?;

        tracing::info!("Job {} created by {}", record.job.id, auth.id);

        Ok(record)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<JobRecord, ServiceError> {
        let record = self
            .db_client
            .get_job_record(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;
        Ok(record)
    }

    pub async fn list_open_jobs(&self) -> Result<Vec<JobRecord>, ServiceError> {
        let records = self.db_client.get_open_jobs().await?;
        Ok(records)
    }

    pub async fn list_jobs_for_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<JobRecord>, ServiceError> {
        let records = self.db_client.get_jobs_by_owner(owner_id).await?;
        Ok(records)
    }

    pub async fn list_jobs_for_worker(
        &self,
        worker_id: Uuid,
    ) -> Result<Vec<JobRecord>, ServiceError> {
        let records = self.db_client.get_jobs_for_worker(worker_id).await?;
        Ok(records)
    }

    /// Register on the job change feed. Deltas cover every job change so a
    /// filtered view can also drop jobs that leave it (e.g. an assignment
    /// removing a job from the open list). Register *before* taking the
    /// snapshot so nothing lands in between; duplicates are keyed by id.
    pub fn job_feed(&self) -> broadcast::Receiver<JobRecord> {
        self.db_client.live.subscribe_jobs()
    }

    /// Append a proposal. The one-per-worker invariant is enforced by the
    /// storage key, not by the snapshot check, so concurrent submissions from
    /// the same worker cannot both land.
    pub async fn submit_proposal(
        &self,
        auth: &AuthUser,
        job_id: Uuid,
        price: f64,
        description: Option<String>,
        duration: Option<String>,
        worker_count: Option<i32>,
    ) -> Result<JobRecord, ServiceError> {
        if !(price > 0.0) {
            return Err(ServiceError::InvalidPrice);
        }

        let profile = self.db_client.get_user_profile(auth.id).await?;
        if profile.map(|p| p.role) != Some(UserRole::Worker) {
            return Err(ServiceError::Authorization(auth.id));
        }

        let record = self.get_job(job_id).await?;
        if !record.job.status.accepts_proposals() {
            return Err(ServiceError::JobNotOpen(job_id));
        }
        if record.has_proposed(auth.id) {
            return Err(ServiceError::DuplicateProposal {
                job_id,
                worker_id: auth.id,
            });
        }

        let appended = self
            .db_client
            .append_proposal(
                job_id,
                auth.id,
                auth.name.clone(),
                price,
                description,
                duration,
                worker_count,
            )
            .await;

        let record = match appended {
            Ok(Some(record)) => record,
            // The job closed between the snapshot check and the insert.
            Ok(None) => return Err(ServiceError::JobNotOpen(job_id)),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(ServiceError::DuplicateProposal {
                    job_id,
                    worker_id: auth.id,
                })
            }
            Err(err) => return Err(err.into()),
        };

        // Best-effort: a failed notification must not roll back the proposal.
        if let Err(err) = self
            .notification_service
            .notify_proposal_received(&record.job, &auth.name, price)
            .await
        {
            tracing::warn!(
                "Proposal on job {} saved but owner notification failed: {}",
                job_id,
                err
            );
        }

        Ok(record)
    }

    /// The acceptance transition: owner-only, locks in one worker and price.
    /// The status guard runs at commit time, so racing calls (double click,
    /// second tab) leave exactly one winner.
    pub async fn accept_proposal(
        &self,
        auth: &AuthUser,
        job_id: Uuid,
        worker_id: Uuid,
    ) -> Result<JobRecord, ServiceError> {
        let record = self.get_job(job_id).await?;

        if record.job.owner_id != auth.id {
            return Err(ServiceError::Authorization(auth.id));
        }
        if record.job.status == JobStatus::Assigned {
            return Err(ServiceError::AlreadyAssigned(job_id));
        }

        let outcome = self.db_client.accept_proposal(job_id, worker_id).await?;

        let record = match outcome {
            AcceptOutcome::Accepted(record) => record,
            AcceptOutcome::NotOpen => return Err(ServiceError::AlreadyAssigned(job_id)),
            AcceptOutcome::ProposalMissing => {
                return Err(ServiceError::ProposalNotFound { job_id, worker_id })
            }
        };

        tracing::info!(
            "Job {} assigned to worker {} at {} TND",
            job_id,
            worker_id,
            record.job.accepted_price.unwrap_or_default()
        );

        // Best-effort; the assignment stands even if the inbox write fails.
        if let Err(err) = self
            .notification_service
            .notify_proposal_accepted(worker_id, &record.job)
            .await
        {
            tracing::warn!(
                "Job {} assigned but worker notification failed: {}",
                job_id,
                err
            );
        }

        Ok(record)
    }
}

fn validate_job_request(description: &str, media: &[MediaUpload]) -> Result<(), ServiceError> {
    if description.trim().is_empty() {
        return Err(ServiceError::Validation(
            "Description is required".to_string(),
        ));
    }
    if media.is_empty() {
        return Err(ServiceError::Validation(
            "At least one photo or video is required".to_string(),
        ));
    }
    Ok(())
}
