use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::db::live::LiveHub;

#[derive(Debug, Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
    pub live: Arc<LiveHub>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient {
            pool,
            live: Arc::new(LiveHub::new()),
        }
    }
}
