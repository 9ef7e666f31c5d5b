// db/chatdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::chatmodel::ChatMessage;

#[async_trait]
pub trait ChatExt {
    async fn insert_message(
        &self,
        job_id: Uuid,
        sender_id: Uuid,
        sender_name: String,
        text: String,
    ) -> Result<ChatMessage, Error>;

    async fn get_message(
        &self,
        job_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<ChatMessage>, Error>;

    /// Full thread, oldest first. `created_at` is the sole sort key.
    async fn get_messages(&self, job_id: Uuid) -> Result<Vec<ChatMessage>, Error>;

    /// One batched update flipping every unread message not sent by the
    /// reader. Returns the flipped messages so they can be re-published.
    async fn mark_thread_read(
        &self,
        job_id: Uuid,
        reader_id: Uuid,
    ) -> Result<Vec<ChatMessage>, Error>;

    async fn get_unread_message_count(&self, job_id: Uuid, reader_id: Uuid)
        -> Result<i64, Error>;
}

#[async_trait]
impl ChatExt for DBClient {
    async fn insert_message(
        &self,
        job_id: Uuid,
        sender_id: Uuid,
        sender_name: String,
        text: String,
    ) -> Result<ChatMessage, Error> {
        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO messages (job_id, sender_id, sender_name, text)
            VALUES ($1, $2, $3, $4)
            RETURNING id, job_id, sender_id, sender_name, text, read, created_at
            "#,
        )
        .bind(job_id)
        .bind(sender_id)
        .bind(sender_name)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        self.live.publish_message(&message);

        Ok(message)
    }

    async fn get_message(
        &self,
        job_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<ChatMessage>, Error> {
        sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, job_id, sender_id, sender_name, text, read, created_at
            FROM messages
            WHERE id = $1 AND job_id = $2
            "#,
        )
        .bind(message_id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_messages(&self, job_id: Uuid) -> Result<Vec<ChatMessage>, Error> {
        sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, job_id, sender_id, sender_name, text, read, created_at
            FROM messages
            WHERE job_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn mark_thread_read(
        &self,
        job_id: Uuid,
        reader_id: Uuid,
    ) -> Result<Vec<ChatMessage>, Error> {
        let updated = sqlx::query_as::<_, ChatMessage>(
            r#"
            UPDATE messages
            SET read = TRUE
            WHERE job_id = $1
              AND sender_id != $2
              AND read = FALSE
            RETURNING id, job_id, sender_id, sender_name, text, read, created_at
            "#,
        )
        .bind(job_id)
        .bind(reader_id)
        .fetch_all(&self.pool)
        .await?;

        for message in &updated {
            self.live.publish_message(message);
        }

        Ok(updated)
    }

    async fn get_unread_message_count(
        &self,
        job_id: Uuid,
        reader_id: Uuid,
    ) -> Result<i64, Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM messages
            WHERE job_id = $1
              AND sender_id != $2
              AND read = FALSE
            "#,
        )
        .bind(job_id)
        .bind(reader_id)
        .fetch_one(&self.pool)
        .await
    }
}
