// db/userdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::usermodel::{UserProfile, UserRole};

#[async_trait]
pub trait UserExt {
    async fn get_user_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, Error>;

    async fn set_user_role(&self, user_id: Uuid, role: UserRole) -> Result<UserProfile, Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, Error> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT user_id, role, created_at, updated_at
            FROM user_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn set_user_role(&self, user_id: Uuid, role: UserRole) -> Result<UserProfile, Error> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO user_profiles (user_id, role)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET role = EXCLUDED.role, updated_at = NOW()
            RETURNING user_id, role, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await
    }
}
