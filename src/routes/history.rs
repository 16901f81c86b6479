use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{AudioFeatures, NewListen, FEATURE_COLUMNS},
    routes::AppState,
};

/// Handler for appending a batch of listening-history rows
pub async fn ingest_history(
    State(state): State<Arc<AppState>>,
    Json(listens): Json<Vec<NewListen>>,
) -> AppResult<(StatusCode, Json<Value>)> {
    if listens.is_empty() {
        return Err(AppError::InvalidInput("History batch is empty".to_string()));
    }
    if let Some(idx) = listens
        .iter()
        .position(|l| l.username.trim().is_empty() || l.track_id.trim().is_empty())
    {
        return Err(AppError::InvalidInput(format!(
            "Row {} is missing username or track_id",
            idx
        )));
    }

    let inserted = state.store.save_history_batch(&listens).await?;

    tracing::info!(rows = listens.len(), inserted, "Listening history ingested");

    Ok((StatusCode::CREATED, Json(json!({ "inserted": inserted }))))
}

/// Handler for upserting a batch of audio-feature rows
pub async fn ingest_audio_features(
    State(state): State<Arc<AppState>>,
    Json(features): Json<Vec<AudioFeatures>>,
) -> AppResult<(StatusCode, Json<Value>)> {
    if features.is_empty() {
        return Err(AppError::InvalidInput(
            "Audio feature batch is empty".to_string(),
        ));
    }
    for (idx, row) in features.iter().enumerate() {
        validate_features(idx, row)?;
    }

    let upserted = state.store.save_audio_features_batch(&features).await?;

    tracing::info!(rows = features.len(), upserted, "Audio features ingested");

    Ok((StatusCode::CREATED, Json(json!({ "upserted": upserted }))))
}

fn validate_features(idx: usize, row: &AudioFeatures) -> AppResult<()> {
    if row.track_id.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("Row {} is missing track_id", idx)));
    }

    let values = [
        row.valence,
        row.tempo,
        row.danceability,
        row.energy,
        row.instrumentalness,
        row.acousticness,
    ];
    match values.iter().zip(FEATURE_COLUMNS).find(|(v, _)| !v.is_finite()) {
        Some((_, column)) => Err(AppError::InvalidInput(format!(
            "Row {} has a non-finite {}",
            idx, column
        ))),
        None => Ok(()),
    }
}
