use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{PersonalizedTrack, SimilarTrack},
    routes::AppState,
    services::recommendations,
};

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub n: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PersonalizedQuery {
    pub username: Option<String>,
    pub n: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse<T> {
    pub recommendations: Vec<T>,
}

/// Handler for tracks similar to a given track
pub async fn similar(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(track_id): Path<String>,
    Query(params): Query<SimilarQuery>,
) -> AppResult<Json<RecommendationsResponse<SimilarTrack>>> {
    let n = state.limits.resolve(params.n, state.limits.default_similar);

    let recommendations = recommendations::similar_tracks(
        &state.engine,
        state.cache.as_ref(),
        state.limits.cache_ttl_secs,
        &track_id,
        n,
    )
    .await?;

    tracing::info!(
        request_id = %request_id,
        track_id = %track_id,
        requested = n,
        returned = recommendations.len(),
        "Similar tracks served"
    );

    Ok(Json(RecommendationsResponse { recommendations }))
}

/// Handler for a user's personalized recommendations
pub async fn personalized(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<PersonalizedQuery>,
) -> AppResult<Json<RecommendationsResponse<PersonalizedTrack>>> {
    // Blank names are rejected; others are looked up exactly as sent
    let username = params
        .username
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("Username is required".to_string()))?;
    let n = state
        .limits
        .resolve(params.n, state.limits.default_personalized);

    let recommendations = recommendations::personalized_tracks(&state.engine, username, n).await?;

    tracing::info!(
        request_id = %request_id,
        username = %username,
        requested = n,
        returned = recommendations.len(),
        "Personalized recommendations served"
    );

    Ok(Json(RecommendationsResponse { recommendations }))
}
