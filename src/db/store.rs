//! Persistence collaborator for listening data
//!
//! The recommendation engine only reads through this trait; the HTTP layer
//! uses the batch operations to feed it.

use crate::{
    error::AppResult,
    models::{AudioFeatures, FeatureRow, HistoryEntry, NewFeedback, NewListen},
};

/// Trait for listening-history storage backends
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ListeningStore: Send + Sync {
    /// Listening history joined with audio features, one row per distinct track
    ///
    /// Rows are ordered by the track's first play so that store order is stable
    /// across rebuilds.
    async fn fetch_joined_history_features(&self) -> AppResult<Vec<FeatureRow>>;

    /// All plays by `username`, oldest first
    async fn fetch_history_for_user(&self, username: &str) -> AppResult<Vec<HistoryEntry>>;

    /// Appends listening-history rows, returning how many were inserted
    async fn save_history_batch(&self, listens: &[NewListen]) -> AppResult<u64>;

    /// Inserts or replaces audio features by track id, returning rows affected
    async fn save_audio_features_batch(&self, features: &[AudioFeatures]) -> AppResult<u64>;

    /// Records feedback on a recommendation, returning the new row id
    async fn record_feedback(&self, feedback: &NewFeedback) -> AppResult<i64>;
}
