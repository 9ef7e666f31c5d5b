pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;
pub mod utils;

use std::sync::Arc;

use config::Config;
use db::db::DBClient;
use service::{
    chat_service::ChatService,
    job_service::JobService,
    notification_service::NotificationService,
    storage_service::{BucketStore, ObjectStore},
};

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    // Services
    pub job_service: Arc<JobService>,
    pub chat_service: Arc<ChatService>,
    pub notification_service: Arc<NotificationService>,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config) -> Self {
        let storage: Arc<dyn ObjectStore> = Arc::new(BucketStore::from_config(&config));
        Self::with_storage(db_client, config, storage)
    }

    /// Same wiring with the object store swapped, so tests can run the full
    /// job flow without a real bucket.
    pub fn with_storage(
        db_client: DBClient,
        config: Config,
        storage: Arc<dyn ObjectStore>,
    ) -> Self {
        let db_client_arc = Arc::new(db_client);

        let notification_service = Arc::new(NotificationService::new(db_client_arc.clone()));
        let chat_service = Arc::new(ChatService::new(db_client_arc.clone()));
        let job_service = Arc::new(JobService::new(
            db_client_arc.clone(),
            storage,
            notification_service.clone(),
        ));

        Self {
            env: config,
            db_client: db_client_arc,
            job_service,
            chat_service,
            notification_service,
        }
    }
}
