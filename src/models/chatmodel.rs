// models/chatmodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One message in a job's chat thread. Immutable once written except for the
/// `read` receipt, which only the non-sender may flip, and only false -> true.
/// `created_at` is assigned by the store and is the sole sort key.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub job_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub text: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
