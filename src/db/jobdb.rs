// db/jobdb.rs
use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::jobmodel::*;

/// Result of the acceptance transition. The update is a single conditional
/// write; whichever caller loses the race observes `NotOpen`.
#[derive(Debug)]
pub enum AcceptOutcome {
    Accepted(JobRecord),
    NotOpen,
    ProposalMissing,
}

#[async_trait]
pub trait JobExt {
    async fn create_job(
        &self,
        owner_id: Uuid,
        owner_email: String,
        description: String,
        media_urls: Vec<String>,
    ) -> Result<JobRecord, Error>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, Error>;

    async fn get_job_record(&self, job_id: Uuid) -> Result<Option<JobRecord>, Error>;

    async fn get_open_jobs(&self) -> Result<Vec<JobRecord>, Error>;

    async fn get_jobs_by_owner(&self, owner_id: Uuid) -> Result<Vec<JobRecord>, Error>;

    async fn get_jobs_for_worker(&self, worker_id: Uuid) -> Result<Vec<JobRecord>, Error>;

    /// Conditional append: the insert only goes through while the job is
    /// still open for proposals, and the unique (job_id, worker_id) key
    /// rejects a second offer from the same worker. Returns `None` when the
    /// job is missing or no longer open.
    async fn append_proposal(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        worker_name: String,
        price: f64,
        description: Option<String>,
        duration: Option<String>,
        worker_count: Option<i32>,
    ) -> Result<Option<JobRecord>, Error>;

    /// Compare-and-swap on job status: exactly one acceptance can succeed.
    async fn accept_proposal(&self, job_id: Uuid, worker_id: Uuid)
        -> Result<AcceptOutcome, Error>;

    /// AI write-back, applied at most once per job. Returns `None` when the
    /// diagnosis (or a failure) was already recorded.
    async fn record_analysis(
        &self,
        job_id: Uuid,
        analysis: &AiAnalysis,
    ) -> Result<Option<JobRecord>, Error>;

    async fn record_analysis_failure(
        &self,
        job_id: Uuid,
        error_message: String,
    ) -> Result<Option<JobRecord>, Error>;
}

impl DBClient {
    async fn proposals_for(&self, job_id: Uuid) -> Result<Vec<Proposal>, Error> {
        sqlx::query_as::<_, Proposal>(
            r#"
            SELECT id, job_id, worker_id, worker_name, price, description,
                   duration, worker_count, status, created_at
            FROM proposals
            WHERE job_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Hydrate a batch of jobs with their proposal ledgers, preserving the
    /// jobs' ordering.
    async fn hydrate(&self, jobs: Vec<Job>) -> Result<Vec<JobRecord>, Error> {
        if jobs.is_empty() {
            return Ok(vec![]);
        }

        let job_ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
        let proposals = sqlx::query_as::<_, Proposal>(
            r#"
            SELECT id, job_id, worker_id, worker_name, price, description,
                   duration, worker_count, status, created_at
            FROM proposals
            WHERE job_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(&job_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_job: HashMap<Uuid, Vec<Proposal>> = HashMap::new();
        for proposal in proposals {
            by_job.entry(proposal.job_id).or_default().push(proposal);
        }

        Ok(jobs
            .into_iter()
            .map(|job| {
                let proposals = by_job.remove(&job.id).unwrap_or_default();
                JobRecord { job, proposals }
            })
            .collect())
    }
}

#[async_trait]
impl JobExt for DBClient {
    async fn create_job(
        &self,
        owner_id: Uuid,
        owner_email: String,
        description: String,
        media_urls: Vec<String>,
    ) -> Result<JobRecord, Error> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (owner_id, owner_email, description, media_urls, status)
            VALUES ($1, $2, $3, $4, 'analyzing'::job_status)
            RETURNING id, owner_id, owner_email, description, media_urls, status,
                      ai_result, error_message, worker_id, accepted_price,
                      accepted_at, created_at
            "#,
        )
        .bind(owner_id)
        .bind(owner_email)
        .bind(description)
        .bind(media_urls)
        .fetch_one(&self.pool)
        .await?;

        let record = JobRecord {
            job,
            proposals: vec![],
        };
        self.live.publish_job_created(&record);

        Ok(record)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, Error> {
        sqlx::query_as::<_, Job>(
            r#"
            SELECT id, owner_id, owner_email, description, media_urls, status,
                   ai_result, error_message, worker_id, accepted_price,
                   accepted_at, created_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_job_record(&self, job_id: Uuid) -> Result<Option<JobRecord>, Error> {
        let Some(job) = self.get_job(job_id).await? else {
            return Ok(None);
        };
        let proposals = self.proposals_for(job.id).await?;
        Ok(Some(JobRecord { job, proposals }))
    }

    async fn get_open_jobs(&self) -> Result<Vec<JobRecord>, Error> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, owner_id, owner_email, description, media_urls, status,
                   ai_result, error_message, worker_id, accepted_price,
                   accepted_at, created_at
            FROM jobs
            WHERE status = 'analyzing'::job_status
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(jobs).await
    }

    async fn get_jobs_by_owner(&self, owner_id: Uuid) -> Result<Vec<JobRecord>, Error> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, owner_id, owner_email, description, media_urls, status,
                   ai_result, error_message, worker_id, accepted_price,
                   accepted_at, created_at
            FROM jobs
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(jobs).await
    }

    async fn get_jobs_for_worker(&self, worker_id: Uuid) -> Result<Vec<JobRecord>, Error> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, owner_id, owner_email, description, media_urls, status,
                   ai_result, error_message, worker_id, accepted_price,
                   accepted_at, created_at
            FROM jobs
            WHERE worker_id = $1
               OR EXISTS (
                      SELECT 1 FROM proposals p
                      WHERE p.job_id = jobs.id AND p.worker_id = $1
                  )
            ORDER BY created_at DESC
            "#,
        )
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(jobs).await
    }

    async fn append_proposal(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        worker_name: String,
        price: f64,
        description: Option<String>,
        duration: Option<String>,
        worker_count: Option<i32>,
    ) -> Result<Option<JobRecord>, Error> {
        let inserted = sqlx::query_as::<_, Proposal>(
            r#"
            INSERT INTO proposals
                (job_id, worker_id, worker_name, price, description, duration, worker_count)
            SELECT j.id, $2, $3, $4, $5, $6, $7
            FROM jobs j
            WHERE j.id = $1
              AND j.status IN ('analyzing'::job_status, 'error'::job_status)
            RETURNING id, job_id, worker_id, worker_name, price, description,
                      duration, worker_count, status, created_at
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(worker_name)
        .bind(price)
        .bind(description)
        .bind(duration)
        .bind(worker_count)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_none() {
            return Ok(None);
        }

        let record = self.get_job_record(job_id).await?;
        if let Some(ref record) = record {
            self.live.publish_job(record);
        }

        Ok(record)
    }

    async fn accept_proposal(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
    ) -> Result<AcceptOutcome, Error> {
        let mut tx = self.pool.begin().await?;

        let proposal = sqlx::query_as::<_, Proposal>(
            r#"
            SELECT id, job_id, worker_id, worker_name, price, description,
                   duration, worker_count, status, created_at
            FROM proposals
            WHERE job_id = $1 AND worker_id = $2
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(proposal) = proposal else {
            return Ok(AcceptOutcome::ProposalMissing);
        };

        let updated = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'assigned'::job_status,
                worker_id = $2,
                accepted_price = $3,
                accepted_at = NOW()
            WHERE id = $1
              AND status IN ('analyzing'::job_status, 'error'::job_status)
            RETURNING id, owner_id, owner_email, description, media_urls, status,
                      ai_result, error_message, worker_id, accepted_price,
                      accepted_at, created_at
            "#,
        )
        .bind(job_id)
        .bind(proposal.worker_id)
        .bind(proposal.price)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = updated else {
            return Ok(AcceptOutcome::NotOpen);
        };

        tx.commit().await?;

        let proposals = self.proposals_for(job_id).await?;
        let record = JobRecord { job, proposals };
        self.live.publish_job(&record);

        Ok(AcceptOutcome::Accepted(record))
    }

    async fn record_analysis(
        &self,
        job_id: Uuid,
        analysis: &AiAnalysis,
    ) -> Result<Option<JobRecord>, Error> {
        let updated = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET ai_result = $2
            WHERE id = $1
              AND status = 'analyzing'::job_status
              AND ai_result IS NULL
              AND error_message IS NULL
            RETURNING id, owner_id, owner_email, description, media_urls, status,
                      ai_result, error_message, worker_id, accepted_price,
                      accepted_at, created_at
            "#,
        )
        .bind(job_id)
        .bind(Json(analysis.clone()))
        .fetch_optional(&self.pool)
        .await?;

        let Some(job) = updated else {
            return Ok(None);
        };

        let proposals = self.proposals_for(job_id).await?;
        let record = JobRecord { job, proposals };
        self.live.publish_job(&record);

        Ok(Some(record))
    }

    async fn record_analysis_failure(
        &self,
        job_id: Uuid,
        error_message: String,
    ) -> Result<Option<JobRecord>, Error> {
        let updated = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'error'::job_status,
                error_message = $2
            WHERE id = $1
              AND status = 'analyzing'::job_status
              AND ai_result IS NULL
              AND error_message IS NULL
            RETURNING id, owner_id, owner_email, description, media_urls, status,
                      ai_result, error_message, worker_id, accepted_price,
                      accepted_at, created_at
            "#,
        )
        .bind(job_id)
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await?;

        let Some(job) = updated else {
            return Ok(None);
        };

        let proposals = self.proposals_for(job_id).await?;
        let record = JobRecord { job, proposals };
        self.live.publish_job(&record);

        Ok(Some(record))
    }
}
