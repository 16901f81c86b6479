use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tunewise_api::{
    config::Config,
    db::{create_pool, create_redis_client, Cache, ListeningStore, PgListeningStore},
    routes::{create_router, AppState, ResultLimits},
    services::{EngineSettings, RecommendationEngine},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tunewise_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url, config.database_max_connections).await?;
    let store: Arc<dyn ListeningStore> = Arc::new(PgListeningStore::new(pool));

    let (cache, cache_handle) = match &config.redis_url {
        Some(url) => {
            let client = create_redis_client(url)?;
            let (cache, handle) = Cache::new(client).await?;
            (Some(cache), Some(handle))
        }
        None => {
            tracing::info!("REDIS_URL not set, recommendation caching disabled");
            (None, None)
        }
    };

    let engine = Arc::new(RecommendationEngine::new(
        store.clone(),
        EngineSettings::from(&config),
    ));

    if config.warm_on_start {
        if let Err(e) = engine.rebuild().await {
            tracing::error!(error = %e, "Initial feature store build failed, will retry on first query");
        }
    }

    let state = AppState {
        engine,
        store,
        cache,
        limits: ResultLimits::from(&config),
    };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %config.bind_address(), "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }

    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
