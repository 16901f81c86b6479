use axum::{extract::State, Extension, Json};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::RequestId,
    routes::AppState,
    services::{EngineStatus, RebuildReport},
};

/// Handler that rebuilds the feature store from current data
pub async fn rebuild(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<RebuildReport>> {
    tracing::info!(request_id = %request_id, "Rebuilding feature store");

    let report = state.engine.rebuild().await?;

    tracing::info!(
        request_id = %request_id,
        published = report.published,
        built_tracks = report.built_tracks,
        skipped = report.built_skipped_rows,
        generation = report.status.generation,
        "Feature store rebuild finished"
    );

    Ok(Json(report))
}

/// Handler reporting the feature store state
pub async fn status(State(state): State<Arc<AppState>>) -> Json<EngineStatus> {
    Json(state.engine.status().await)
}
