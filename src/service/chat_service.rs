// service/chat_service.rs
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    db::{chatdb::ChatExt, db::DBClient, jobdb::JobExt},
    middleware::AuthUser,
    models::{
        chatmodel::ChatMessage,
        jobmodel::{Job, JobStatus},
    },
    service::error::ServiceError,
};

const REPLY_EXCERPT_LEN: usize = 50;

fn quote_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^> Replying to (.*?): "(.*?)"\n\n"#).expect("quote pattern is valid")
    })
}

/// Quoted-reply composition is a pure text transformation, not a structural
/// field: the outgoing message embeds an excerpt of the referenced one.
pub fn compose_reply(reply_to_name: &str, reply_to_text: &str, body: &str) -> String {
    let clean = strip_quote(reply_to_text);
    let excerpt: String = clean.chars().take(REPLY_EXCERPT_LEN).collect();
    format!("> Replying to {}: \"{}\"\n\n{}", reply_to_name, excerpt, body)
}

/// Message text without its leading reply quote, if any.
pub fn strip_quote(text: &str) -> String {
    quote_regex().replace(text, "").into_owned()
}

/// The quoted excerpt of a reply message, if it carries one.
pub fn extract_quote(text: &str) -> Option<String> {
    quote_regex()
        .captures(text)
        .map(|caps| caps[2].to_string())
}

#[derive(Debug, Clone)]
pub struct ChatService {
    db_client: Arc<DBClient>,
}

impl ChatService {
    pub fn new(db_client: Arc<DBClient>) -> Self {
        Self { db_client }
    }

    /// Chat policy: the channel opens once the job is assigned, and its only
    /// participants are the owner and the assigned worker.
    fn participants(job: &Job) -> Result<(Uuid, Uuid), ServiceError> {
        match (job.status, job.worker_id) {
            (JobStatus::Assigned, Some(worker_id)) => Ok((job.owner_id, worker_id)),
            (JobStatus::Completed, Some(worker_id)) => Ok((job.owner_id, worker_id)),
            _ => Err(ServiceError::ChatNotActive(job.id)),
        }
    }

    async fn authorize(&self, auth: &AuthUser, job_id: Uuid) -> Result<Job, ServiceError> {
        let job = self
            .db_client
            .get_job(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;

        let (owner_id, worker_id) = Self::participants(&job)?;
        if auth.id != owner_id && auth.id != worker_id {
            return Err(ServiceError::Authorization(auth.id));
        }

        Ok(job)
    }

    pub async fn send_message(
        &self,
        auth: &AuthUser,
        job_id: Uuid,
        text: String,
        reply_to: Option<Uuid>,
    ) -> Result<ChatMessage, ServiceError> {
        self.authorize(auth, job_id).await?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::EmptyMessage);
        }

        let outgoing = match reply_to {
            Some(message_id) => {
                let referenced = self
                    .db_client
                    .get_message(job_id, message_id)
                    .await?
                    .ok_or(ServiceError::MessageNotFound(message_id))?;
                compose_reply(&referenced.sender_name, &referenced.text, trimmed)
            }
            None => trimmed.to_string(),
        };

        let message = self
            .db_client
            .insert_message(job_id, auth.id, auth.name.clone(), outgoing)
            .await?;

        Ok(message)
    }

    pub async fn get_thread(
        &self,
        auth: &AuthUser,
        job_id: Uuid,
    ) -> Result<Vec<ChatMessage>, ServiceError> {
        self.authorize(auth, job_id).await?;
        let messages = self.db_client.get_messages(job_id).await?;
        Ok(messages)
    }

    /// Flip every unread message from the other participant in one batched
    /// write. Idempotent: a second call finds nothing to flip.
    pub async fn mark_thread_read(
        &self,
        auth: &AuthUser,
        job_id: Uuid,
    ) -> Result<u64, ServiceError> {
        self.authorize(auth, job_id).await?;
        let flipped = self.db_client.mark_thread_read(job_id, auth.id).await?;
        Ok(flipped.len() as u64)
    }

    pub async fn unread_count(&self, auth: &AuthUser, job_id: Uuid) -> Result<i64, ServiceError> {
        self.authorize(auth, job_id).await?;
        let count = self
            .db_client
            .get_unread_message_count(job_id, auth.id)
            .await?;
        Ok(count)
    }

    /// Thread subscription: replays the full ordered thread, then live
    /// deltas. The receiver is registered before the replay query so no
    /// message falls between the two; duplicates are keyed by id.
    pub async fn subscribe(
        &self,
        auth: &AuthUser,
        job_id: Uuid,
    ) -> Result<(Vec<ChatMessage>, broadcast::Receiver<ChatMessage>), ServiceError> {
        self.authorize(auth, job_id).await?;
        let receiver = self.db_client.live.subscribe_messages(job_id);
        let snapshot = self.db_client.get_messages(job_id).await?;
        Ok((snapshot, receiver))
    }
}
