use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use fixmatch::{
    config::Config,
    db::db::DBClient,
    routes::create_router,
    service::annotation_service::{AnnotationDispatcher, GeminiVisionClient, VisionClient},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init();

    // Connect to PostgreSQL
    let pool = match PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            println!("✅ Connection to the database is successful!");
            pool
        }
        Err(err) => {
            println!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    sqlx::migrate!("./migrations").run(&pool).await?;

    let db_client = DBClient::new(pool);
    let app_state = Arc::new(AppState::new(db_client, config.clone()));

    // AI annotation bridge: a single dispatcher observes job creation events
    // and attaches the diagnosis out of band. Without an API key new jobs
    // simply wait in `analyzing`, which the clients treat as a valid state.
    match config.gemini_api_key.clone() {
        Some(api_key) => {
            if let Some(events) = app_state.db_client.live.take_created_events() {
                let vision: Arc<dyn VisionClient> = Arc::new(GeminiVisionClient::new(
                    config.gemini_api_base.clone(),
                    api_key,
                    config.gemini_model.clone(),
                ));
                let dispatcher = AnnotationDispatcher::new(app_state.db_client.clone(), vision);
                tokio::spawn(dispatcher.run(events));
            }
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set - new jobs will keep waiting for a diagnosis");
        }
    }

    let allowed_origins = vec![
        config.app_url.parse::<HeaderValue>()?,
        "http://localhost:4200".parse::<HeaderValue>()?,
    ];

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    let app = create_router(app_state.clone()).layer(cors);

    println!("🚀 Server is running on http://localhost:{}", config.port);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port)).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
