// config.rs
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub app_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    // Object store (media uploads)
    pub storage_url: String,
    pub storage_bucket: String,
    pub storage_api_key: String,
    pub max_upload_bytes: usize,
    // AI annotation bridge
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub gemini_model: String,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let jwt_maxage = std::env::var("JWT_MAXAGE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(3600);
        let app_url =
            std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:4200".to_string());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8000);

        // Object store configuration (with defaults for local development)
        let storage_url = std::env::var("STORAGE_URL")
            .unwrap_or_else(|_| "http://localhost:54321/storage/v1".to_string());
        let storage_bucket =
            std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "breakdowns".to_string());
        let storage_api_key = std::env::var("STORAGE_API_KEY").unwrap_or_else(|_| "".to_string());
        let max_upload_bytes = std::env::var("MAX_UPLOAD_MB")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10)
            * 1024
            * 1024;

        // AI annotation configuration; the dispatcher stays disabled without a key
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
        let gemini_api_base = std::env::var("GEMINI_API_BASE")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());
        let gemini_model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());

        Config {
            database_url,
            app_url,
            jwt_secret,
            jwt_maxage,
            port,
            storage_url,
            storage_bucket,
            storage_api_key,
            max_upload_bytes,
            gemini_api_key,
            gemini_api_base,
            gemini_model,
        }
    }
}
