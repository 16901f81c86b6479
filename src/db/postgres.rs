use std::collections::HashSet;

use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};

use crate::{
    db::ListeningStore,
    error::AppResult,
    models::{AudioFeatures, FeatureRow, HistoryEntry, NewFeedback, NewListen},
};

/// Rows written per INSERT statement
const BATCH_SIZE: usize = 1000;

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// [`ListeningStore`] backed by the `listening_history`, `audio_features` and
/// `recommendation_feedback` tables
#[derive(Clone)]
pub struct PgListeningStore {
    pool: PgPool,
}

impl PgListeningStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ListeningStore for PgListeningStore {
    async fn fetch_joined_history_features(&self) -> AppResult<Vec<FeatureRow>> {
        let rows = sqlx::query_as::<_, FeatureRow>(
            r#"
            SELECT track_id, track_name, artist_name,
                   valence, tempo, danceability, energy, instrumentalness, acousticness
            FROM (
                SELECT DISTINCT ON (lh.track_id)
                       lh.track_id, lh.track_name, lh.artist_name, lh.timestamp AS first_played,
                       af.valence, af.tempo, af.danceability, af.energy,
                       af.instrumentalness, af.acousticness
                FROM listening_history lh
                JOIN audio_features af ON af.track_id = lh.track_id
                ORDER BY lh.track_id, lh.timestamp, lh.id
            ) tracks
            ORDER BY first_played, track_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(rows = rows.len(), "Fetched joined history features");

        Ok(rows)
    }

    async fn fetch_history_for_user(&self, username: &str) -> AppResult<Vec<HistoryEntry>> {
        let entries = sqlx::query_as::<_, HistoryEntry>(
            r#"
            SELECT track_id, timestamp AS played_at
            FROM listening_history
            WHERE username = $1
            ORDER BY timestamp, id
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn save_history_batch(&self, listens: &[NewListen]) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for (batch_no, chunk) in listens.chunks(BATCH_SIZE).enumerate() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO listening_history \
                 (timestamp, username, track_id, track_name, artist_name, album_name, duration_ms) ",
            );
            builder.push_values(chunk, |mut b, listen| {
                b.push_bind(listen.played_at)
                    .push_bind(&listen.username)
                    .push_bind(&listen.track_id)
                    .push_bind(&listen.track_name)
                    .push_bind(&listen.artist_name)
                    .push_bind(&listen.album_name)
                    .push_bind(listen.duration_ms);
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();

            tracing::info!(
                batch = batch_no,
                processed = (batch_no * BATCH_SIZE + chunk.len()),
                total = listens.len(),
                "Processed listening history batch"
            );
        }

        tx.commit().await?;

        Ok(inserted)
    }

    async fn save_audio_features_batch(&self, features: &[AudioFeatures]) -> AppResult<u64> {
        let features = latest_per_track(features);
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;

        for chunk in features.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO audio_features \
                 (track_id, valence, tempo, danceability, energy, instrumentalness, acousticness) ",
            );
            builder.push_values(chunk.iter().copied(), |mut b, f| {
                b.push_bind(&f.track_id)
                    .push_bind(f.valence)
                    .push_bind(f.tempo)
                    .push_bind(f.danceability)
                    .push_bind(f.energy)
                    .push_bind(f.instrumentalness)
                    .push_bind(f.acousticness);
            });
            builder.push(
                " ON CONFLICT (track_id) DO UPDATE SET \
                 valence = EXCLUDED.valence, tempo = EXCLUDED.tempo, \
                 danceability = EXCLUDED.danceability, energy = EXCLUDED.energy, \
                 instrumentalness = EXCLUDED.instrumentalness, \
                 acousticness = EXCLUDED.acousticness",
            );

            affected += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        tracing::info!(tracks = features.len(), "Audio features stored");

        Ok(affected)
    }

    async fn record_feedback(&self, feedback: &NewFeedback) -> AppResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO recommendation_feedback (username, track_id, feedback, interaction_type, timestamp)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id
            "#,
        )
        .bind(&feedback.username)
        .bind(&feedback.track_id)
        .bind(&feedback.feedback)
        .bind(&feedback.interaction_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}

/// Keeps the last row for each track id, ordered by those last occurrences
///
/// A single upsert statement may not touch the same key twice.
fn latest_per_track(features: &[AudioFeatures]) -> Vec<&AudioFeatures> {
    let mut seen = HashSet::new();
    let mut latest: Vec<&AudioFeatures> = features
        .iter()
        .rev()
        .filter(|f| seen.insert(f.track_id.as_str()))
        .collect();
    latest.reverse();
    latest
}
