// service/notification_service.rs
use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    db::{db::DBClient, notificationdb::NotificationExt},
    middleware::AuthUser,
    models::{jobmodel::Job, notificationmodel::Notification},
    service::error::ServiceError,
};

const DEFAULT_INBOX_LIMIT: i64 = 20;

#[derive(Debug, Clone)]
pub struct NotificationService {
    db_client: Arc<DBClient>,
}

impl NotificationService {
    pub fn new(db_client: Arc<DBClient>) -> Self {
        Self { db_client }
    }

    /// Fan-out is best-effort relative to the write that triggered it: the
    /// error is returned for diagnostics but callers must not fail the
    /// triggering operation on it.
    pub async fn notify(
        &self,
        recipient_id: Uuid,
        message: String,
        kind: Option<String>,
        job_id: Option<Uuid>,
    ) -> Result<Notification, ServiceError> {
        let notification = self
            .db_client
            .create_notification(recipient_id, message, kind, job_id)
            .await?;

        Ok(notification)
    }

    pub async fn notify_proposal_received(
        &self,
        job: &Job,
        worker_name: &str,
        price: f64,
    ) -> Result<Notification, ServiceError> {
        tracing::info!(
            "Proposal notification: owner {} received an offer on job {}",
            job.owner_id,
            job.id
        );

        self.notify(
            job.owner_id,
            format!("{} sent you an offer of {} TND", worker_name, price),
            Some("proposal_received".to_string()),
            Some(job.id),
        )
        .await
    }

    pub async fn notify_proposal_accepted(
        &self,
        worker_id: Uuid,
        job: &Job,
    ) -> Result<Notification, ServiceError> {
        tracing::info!(
            "Acceptance notification: worker {} chosen for job {}",
            worker_id,
            job.id
        );

        self.notify(
            worker_id,
            "Your offer has been accepted!".to_string(),
            Some("proposal_accepted".to_string()),
            Some(job.id),
        )
        .await
    }

    pub async fn list(
        &self,
        auth: &AuthUser,
        limit: Option<i64>,
    ) -> Result<Vec<Notification>, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_INBOX_LIMIT).clamp(1, 100);
        let notifications = self.db_client.get_notifications(auth.id, limit).await?;
        Ok(notifications)
    }

    /// Idempotent: marking an already-read notification is a no-op. Only the
    /// recipient may flip the flag.
    pub async fn mark_read(
        &self,
        auth: &AuthUser,
        notification_id: Uuid,
    ) -> Result<Notification, ServiceError> {
        let notification = self
            .db_client
            .get_notification(notification_id)
            .await?
            .ok_or(ServiceError::NotificationNotFound(notification_id))?;

        if notification.recipient_id != auth.id {
            return Err(ServiceError::Authorization(auth.id));
        }

        if notification.read {
            return Ok(notification);
        }

        let updated = self
            .db_client
            .mark_notification_read(notification_id, auth.id)
            .await?
            .ok_or(ServiceError::NotificationNotFound(notification_id))?;

        Ok(updated)
    }

    pub async fn mark_all_read(&self, auth: &AuthUser) -> Result<u64, ServiceError> {
        let flipped = self.db_client.mark_all_notifications_read(auth.id).await?;
        Ok(flipped)
    }

    pub async fn unread_count(&self, auth: &AuthUser) -> Result<i64, ServiceError> {
        let count = self
            .db_client
            .get_unread_notification_count(auth.id)
            .await?;
        Ok(count)
    }

    /// Inbox subscription: the receiver is registered before the snapshot is
    /// read so no entry created in between is missed (an entry may appear in
    /// both; consumers key by id).
    pub async fn subscribe(
        &self,
        auth: &AuthUser,
    ) -> Result<(Vec<Notification>, broadcast::Receiver<Notification>), ServiceError> {
        let receiver = self.db_client.live.subscribe_notifications(auth.id);
        let snapshot = self
            .db_client
            .get_notifications(auth.id, DEFAULT_INBOX_LIMIT)
            .await?;
        Ok((snapshot, receiver))
    }
}
