use axum::{
    http::{Method, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    db::{Cache, ListeningStore},
    middleware::{make_span_with_request_id, request_id_middleware},
    services::RecommendationEngine,
};

pub mod engine;
pub mod feedback;
pub mod history;
pub mod recommendations;

/// Result-size defaults and bounds applied to query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultLimits {
    pub default_similar: usize,
    pub default_personalized: usize,
    pub max_results: usize,
    pub cache_ttl_secs: u64,
}

impl Default for ResultLimits {
    fn default() -> Self {
        Self {
            default_similar: 10,
            default_personalized: 20,
            max_results: 100,
            cache_ttl_secs: 3600,
        }
    }
}

impl From<&Config> for ResultLimits {
    fn from(config: &Config) -> Self {
        Self {
            default_similar: config.default_similar_count,
            default_personalized: config.default_personalized_count,
            max_results: config.max_results,
            cache_ttl_secs: config.cache_ttl_secs,
        }
    }
}

impl ResultLimits {
    /// Requested count, or `default` when absent, capped at `max_results`
    pub fn resolve(&self, requested: Option<usize>, default: usize) -> usize {
        requested.unwrap_or(default).min(self.max_results)
    }
}

/// Shared application state
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    pub store: Arc<dyn ListeningStore>,
    pub cache: Option<Cache>,
    pub limits: ResultLimits,
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(Arc::new(state))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(cors),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/tracks/:track_id/recommendations",
            get(recommendations::similar),
        )
        .route("/recommendations", get(recommendations::personalized))
        .route("/history", post(history::ingest_history))
        .route("/audio-features", post(history::ingest_audio_features))
        .route("/feedback", post(feedback::record))
        .route("/engine/rebuild", post(engine::rebuild))
        .route("/engine/status", get(engine::status))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
