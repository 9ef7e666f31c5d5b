use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Analyzing,
    Assigned,
    Completed,
    Error,
}

impl JobStatus {
    pub fn to_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Assigned => "assigned",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// A failed AI diagnosis is informational; the job keeps collecting
    /// offers until the owner accepts one.
    pub fn accepts_proposals(&self) -> bool {
        matches!(self, JobStatus::Analyzing | JobStatus::Error)
    }
}

/// Structured diagnosis written back by the AI annotation bridge.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AiAnalysis {
    pub recommended_tools: Vec<String>,
    pub estimated_price: String,
    pub advice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_email: String,
    pub description: String,
    pub media_urls: Vec<String>,
    pub status: JobStatus,
    pub ai_result: Option<Json<AiAnalysis>>,
    pub error_message: Option<String>,
    pub worker_id: Option<Uuid>,
    pub accepted_price: Option<f64>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Proposal {
    pub id: Uuid,
    pub job_id: Uuid,
    pub worker_id: Uuid,
    pub worker_name: String,
    pub price: f64,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub worker_count: Option<i32>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A job together with its proposal ledger, ordered by submission time.
/// This is the document shape delivered to clients and live subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(flatten)]
    pub job: Job,
    pub proposals: Vec<Proposal>,
}

impl JobRecord {
    pub fn has_proposed(&self, worker_id: Uuid) -> bool {
        self.proposals.iter().any(|p| p.worker_id == worker_id)
    }

    /// Whether this record belongs in a worker's job feed: either the job is
    /// assigned to them or they have an offer on it.
    pub fn involves_worker(&self, worker_id: Uuid) -> bool {
        self.job.worker_id == Some(worker_id) || self.has_proposed(worker_id)
    }
}
