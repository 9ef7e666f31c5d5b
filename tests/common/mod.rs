use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use fixmatch::{
    db::{db::DBClient, userdb::UserExt},
    middleware::AuthUser,
    models::usermodel::UserRole,
    service::{
        chat_service::ChatService,
        job_service::JobService,
        notification_service::NotificationService,
        storage_service::{MediaUpload, ObjectStore, StorageError},
    },
};

/// Object store double: accepts everything and hands back deterministic
/// public URLs, so the full create-job flow runs without a real bucket.
pub struct StubStore;

#[async_trait]
impl ObjectStore for StubStore {
    async fn upload(
        &self,
        path: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
        _file_name: &str,
    ) -> Result<String, StorageError> {
        Ok(format!("https://cdn.test/{}", path))
    }
}

pub struct TestApp {
    pub db: Arc<DBClient>,
    pub jobs: Arc<JobService>,
    pub chat: Arc<ChatService>,
    pub notifications: Arc<NotificationService>,
}

/// Connects to TEST_DATABASE_URL and resets the schema. Returns `None` when
/// the variable is not set so DB-backed tests skip instead of failing.
pub async fn try_setup() -> Option<TestApp> {
    let _ = dotenv::dotenv();

    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping DB-backed test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("failed to connect to TEST_DATABASE_URL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    sqlx::query("TRUNCATE TABLE proposals, messages, notifications, jobs, user_profiles CASCADE")
        .execute(&pool)
        .await
        .expect("truncate failed");

    let db = Arc::new(DBClient::new(pool));
    let notifications = Arc::new(NotificationService::new(db.clone()));
    let jobs = Arc::new(JobService::new(
        db.clone(),
        Arc::new(StubStore),
        notifications.clone(),
    ));
    let chat = Arc::new(ChatService::new(db.clone()));

    Some(TestApp {
        db,
        jobs,
        chat,
        notifications,
    })
}

pub fn auth_user(name: &str) -> AuthUser {
    AuthUser {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
    }
}

pub async fn client(app: &TestApp, name: &str) -> AuthUser {
    let user = auth_user(name);
    app.db
        .set_user_role(user.id, UserRole::Client)
        .await
        .expect("set client role");
    user
}

pub async fn worker(app: &TestApp, name: &str) -> AuthUser {
    let user = auth_user(name);
    app.db
        .set_user_role(user.id, UserRole::Worker)
        .await
        .expect("set worker role");
    user
}

pub fn media(file_name: &str) -> MediaUpload {
    MediaUpload {
        file_name: file_name.to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
    }
}
