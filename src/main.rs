//! Waldo - listing API for the Waldo.click marketplace

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waldo::{
    api::{self, AppState, RequestStats},
    cache::create_cache,
    config::Config,
    db::{self, repositories::SqlxEntityRepository},
    models::PageLimits,
    services::EntityService,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waldo=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Waldo listing API...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    config.validate()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    let cache = create_cache(&config.cache);
    tracing::info!("Cache initialized");

    let entity_service = Arc::new(EntityService::new(
        SqlxEntityRepository::boxed(pool.clone()),
        cache,
        PageLimits::from(&config.api),
    ));

    if config.api.token.is_none() {
        tracing::warn!("No api.token configured; write endpoints are open");
    }

    let state = AppState {
        pool: pool.clone(),
        entity_service,
        api_token: config.api.token.as_deref().map(Arc::from),
        request_stats: Arc::new(RequestStats::new()),
    };

    let app = api::build_router(state, &config.api.prefix, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}{}", addr, config.api.prefix);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
}
