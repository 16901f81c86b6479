use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RowError;

/// Number of audio-feature dimensions describing a track
pub const FEATURE_COUNT: usize = 6;

/// Feature column names, in vector order
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "valence",
    "tempo",
    "danceability",
    "energy",
    "instrumentalness",
    "acousticness",
];

/// Fixed-order audio-feature vector (see [`FEATURE_COLUMNS`])
pub type FeatureVector = [f64; FEATURE_COUNT];

// ============================================================================
// Feature Store Types
// ============================================================================

/// A track and its audio-feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRecord {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub features: FeatureVector,
}

/// Listening history joined with audio features, one row per track
///
/// Every feature column is nullable in storage; incomplete rows are rejected
/// by [`FeatureRow::into_record`].
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FeatureRow {
    pub track_id: String,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub valence: Option<f64>,
    pub tempo: Option<f64>,
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub acousticness: Option<f64>,
}

impl FeatureRow {
    /// Validates the row and converts it into a [`TrackRecord`]
    pub fn into_record(self) -> Result<TrackRecord, RowError> {
        let raw = [
            self.valence,
            self.tempo,
            self.danceability,
            self.energy,
            self.instrumentalness,
            self.acousticness,
        ];

        let mut features = [0.0; FEATURE_COUNT];
        for (dim, (value, column)) in raw.into_iter().zip(FEATURE_COLUMNS).enumerate() {
            let value = value.ok_or_else(|| RowError::MissingFeature {
                track_id: self.track_id.clone(),
                column,
            })?;
            if !value.is_finite() {
                return Err(RowError::NonFiniteFeature {
                    track_id: self.track_id.clone(),
                    column,
                    value,
                });
            }
            features[dim] = value;
        }

        Ok(TrackRecord {
            track_id: self.track_id,
            track_name: self.track_name.unwrap_or_default(),
            artist_name: self.artist_name.unwrap_or_default(),
            features,
        })
    }
}

// ============================================================================
// Recommendation Results
// ============================================================================

/// One entry of a track-to-track similarity result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarTrack {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub score: f64,
}

/// One entry of a personalized result
///
/// `frequency` counts how many seed neighbour lists contained the track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonalizedTrack {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub frequency: u32,
}

// ============================================================================
// Listening History & Feedback
// ============================================================================

/// A single play of a track by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub track_id: String,
    pub played_at: DateTime<Utc>,
}

/// Listening-history row to persist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewListen {
    pub played_at: DateTime<Utc>,
    pub username: String,
    pub track_id: String,
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<i32>,
}

/// Audio-feature row to persist, keyed by track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioFeatures {
    pub track_id: String,
    pub valence: f64,
    pub tempo: f64,
    pub danceability: f64,
    pub energy: f64,
    pub instrumentalness: f64,
    pub acousticness: f64,
}

/// User feedback on a recommended track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewFeedback {
    pub username: String,
    pub track_id: String,
    pub feedback: String,
    pub interaction_type: String,
}
