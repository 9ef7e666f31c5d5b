// db/notificationdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::notificationmodel::Notification;

#[async_trait]
pub trait NotificationExt {
    async fn create_notification(
        &self,
        recipient_id: Uuid,
        message: String,
        kind: Option<String>,
        job_id: Option<Uuid>,
    ) -> Result<Notification, Error>;

    async fn get_notification(&self, notification_id: Uuid) -> Result<Option<Notification>, Error>;

    async fn get_notifications(
        &self,
        recipient_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, Error>;

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Option<Notification>, Error>;

    async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> Result<u64, Error>;

    async fn get_unread_notification_count(&self, recipient_id: Uuid) -> Result<i64, Error>;
}

#[async_trait]
impl NotificationExt for DBClient {
    async fn create_notification(
        &self,
        recipient_id: Uuid,
        message: String,
        kind: Option<String>,
        job_id: Option<Uuid>,
    ) -> Result<Notification, Error> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (recipient_id, message, kind, job_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, recipient_id, kind, job_id, message, read, created_at
            "#,
        )
        .bind(recipient_id)
        .bind(message)
        .bind(kind)
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;

        self.live.publish_notification(&notification);

        Ok(notification)
    }

    async fn get_notification(&self, notification_id: Uuid) -> Result<Option<Notification>, Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_id, kind, job_id, message, read, created_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(notification_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_notifications(
        &self,
        recipient_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_id, kind, job_id, message, read, created_at
            FROM notifications
            WHERE recipient_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(recipient_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Option<Notification>, Error> {
        let updated = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET read = TRUE
            WHERE id = $1 AND recipient_id = $2
            RETURNING id, recipient_id, kind, job_id, message, read, created_at
            "#,
        )
        .bind(notification_id)
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(ref notification) = updated {
            self.live.publish_notification(notification);
        }

        Ok(updated)
    }

    async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read = TRUE
            WHERE recipient_id = $1 AND read = FALSE
            "#,
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_unread_notification_count(&self, recipient_id: Uuid) -> Result<i64, Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE recipient_id = $1 AND read = FALSE
            "#,
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
    }
}
