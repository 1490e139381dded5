//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, DbCache, DeepSeekTransport, FsTemplateSource, InMemoryCache},
    config::{CacheBackend, Config},
    error::ApiError,
    web::{router, state::AppState},
};
use autodoc_core::ports::ResponseCache;
use autodoc_core::{AiClient, DocumentRenderer};
use axum::http::{header::{ACCEPT, CONTENT_TYPE}, Method};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let transport = Arc::new(DeepSeekTransport::new(
        config.deepseek_api_url.clone(),
        config.deepseek_api_key.clone(),
        config.deepseek_timeout,
    )?);

    let cache: Arc<dyn ResponseCache> = match config.cache_backend {
        CacheBackend::Memory => Arc::new(InMemoryCache::new(config.cache_max_entries)),
        CacheBackend::Database => Arc::new(DbCache::new(db_pool.clone())),
    };
    info!("Using {:?} response cache", config.cache_backend);

    let ai = Arc::new(AiClient::new(
        transport,
        cache,
        db_adapter.clone(),
        config.ai.clone(),
    ));
    let renderer = Arc::new(DocumentRenderer::new(Arc::new(FsTemplateSource::new(
        config.media_root.clone(),
    ))));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        ai,
        renderer,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let app = router(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "OpenAPI document available at http://{}/api-docs/openapi.json",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
