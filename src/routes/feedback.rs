use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::NewFeedback,
    routes::AppState,
};

/// Identifier sent either as a JSON string or as an integer
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FeedbackId {
    Text(String),
    Number(i64),
}

impl From<FeedbackId> for String {
    fn from(id: FeedbackId) -> Self {
        match id {
            FeedbackId::Text(text) => text,
            FeedbackId::Number(number) => number.to_string(),
        }
    }
}

/// Feedback payload
///
/// `user_id` is the listener's username and `recommendation_id` the
/// recommended track id. Integer ids are accepted and stored as text.
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub user_id: Option<FeedbackId>,
    pub recommendation_id: Option<FeedbackId>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub interaction_type: Option<String>,
}

impl TryFrom<FeedbackRequest> for NewFeedback {
    type Error = AppError;

    fn try_from(request: FeedbackRequest) -> Result<Self, Self::Error> {
        let required = |value: Option<FeedbackId>, field: &str| {
            value
                .map(String::from)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::InvalidInput(format!("Missing required field: {}", field)))
        };

        Ok(NewFeedback {
            username: required(request.user_id, "user_id")?,
            track_id: required(request.recommendation_id, "recommendation_id")?,
            feedback: request.feedback.unwrap_or_default(),
            interaction_type: request.interaction_type.unwrap_or_default(),
        })
    }
}

/// Handler for recording feedback on a recommended track
pub async fn record(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FeedbackRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let feedback = NewFeedback::try_from(request)?;
    let id = state.store.record_feedback(&feedback).await?;

    tracing::info!(
        feedback_id = id,
        username = %feedback.username,
        track_id = %feedback.track_id,
        "Feedback recorded"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Feedback recorded", "id": id })),
    ))
}
