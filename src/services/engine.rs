use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::{
    config::Config,
    db::ListeningStore,
    error::AppResult,
    models::{PersonalizedTrack, SimilarTrack},
    services::{
        feature_store::FeatureStore, personalization::PersonalizationAggregator,
        similarity::SimilarityRanker,
    },
};

/// Tunables for seed expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub seed_tracks: usize,
    pub neighbors_per_seed: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            seed_tracks: 10,
            neighbors_per_seed: 5,
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            seed_tracks: config.seed_tracks,
            neighbors_per_seed: config.neighbors_per_seed,
        }
    }
}

/// A published feature store and the generation it was published as
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub store: Arc<FeatureStore>,
    pub generation: u64,
}

enum StoreState {
    Unbuilt,
    Ready(Snapshot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Unbuilt,
    Ready,
}

/// Summary of the engine's current feature store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub tracks: usize,
    pub skipped_rows: usize,
    pub generation: u64,
}

/// Outcome of an explicit rebuild
///
/// `built_tracks` and `built_skipped_rows` describe the attempted build even
/// when it was not published; the flattened status describes what is now
/// serving queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub published: bool,
    pub built_tracks: usize,
    pub built_skipped_rows: usize,
    #[serde(flatten)]
    pub status: EngineStatus,
}

/// Content-based recommendation engine
///
/// Owns the feature store. The store is built lazily on the first query and
/// replaced only by [`RecommendationEngine::rebuild`]. Readers clone the
/// published [`Snapshot`] and never see a half-built store.
pub struct RecommendationEngine {
    source: Arc<dyn ListeningStore>,
    settings: EngineSettings,
    state: RwLock<StoreState>,
    build_lock: Mutex<u64>,
}

impl RecommendationEngine {
    pub fn new(source: Arc<dyn ListeningStore>, settings: EngineSettings) -> Self {
        Self {
            source,
            settings,
            state: RwLock::new(StoreState::Unbuilt),
            build_lock: Mutex::new(0),
        }
    }

    /// Returns the published snapshot, building it first if needed
    ///
    /// An empty build is not published; the caller gets an empty snapshot and
    /// the next query tries again.
    pub async fn ensure_ready(&self) -> AppResult<Snapshot> {
        if let Some(snapshot) = self.published().await {
            return Ok(snapshot);
        }

        let mut generation = self.build_lock.lock().await;

        // Another caller may have built while we waited for the lock
        if let Some(snapshot) = self.published().await {
            return Ok(snapshot);
        }

        let store = self.build_store().await?;
        Ok(self
            .publish(store, &mut generation)
            .await
            .unwrap_or_else(|| Snapshot {
                store: Arc::new(FeatureStore::empty()),
                generation: *generation,
            }))
    }

    /// Rebuilds the feature store from the source and swaps it in
    ///
    /// A build with no usable tracks leaves the current store in place and is
    /// reported with `published: false`.
    pub async fn rebuild(&self) -> AppResult<RebuildReport> {
        let mut generation = self.build_lock.lock().await;
        let store = self.build_store().await?;
        let built_tracks = store.len();
        let built_skipped_rows = store.skipped_rows();
        let published = self.publish(store, &mut generation).await.is_some();

        Ok(RebuildReport {
            published,
            built_tracks,
            built_skipped_rows,
            status: self.status().await,
        })
    }

    pub async fn status(&self) -> EngineStatus {
        match &*self.state.read().await {
            StoreState::Unbuilt => EngineStatus {
                state: EngineState::Unbuilt,
                tracks: 0,
                skipped_rows: 0,
                generation: 0,
            },
            StoreState::Ready(snapshot) => EngineStatus {
                state: EngineState::Ready,
                tracks: snapshot.store.len(),
                skipped_rows: snapshot.store.skipped_rows(),
                generation: snapshot.generation,
            },
        }
    }

    /// Tracks most similar to `track_id`, best first
    ///
    /// Unknown tracks yield an empty list.
    pub async fn get_recommendations(&self, track_id: &str, n: usize) -> AppResult<Vec<SimilarTrack>> {
        let snapshot = self.ensure_ready().await?;
        Ok(Self::recommend_from(&snapshot, track_id, n))
    }

    /// Similar tracks computed against a specific snapshot
    pub fn recommend_from(snapshot: &Snapshot, track_id: &str, n: usize) -> Vec<SimilarTrack> {
        match SimilarityRanker::new(&snapshot.store).recommend(track_id, n) {
            Some(tracks) => tracks,
            None => {
                tracing::warn!(track_id = %track_id, "No features found for track");
                Vec::new()
            }
        }
    }

    /// Personalized recommendations from a user's listening history
    pub async fn get_personalized_recommendations(
        &self,
        username: &str,
        n: usize,
    ) -> AppResult<Vec<PersonalizedTrack>> {
        let history = self.source.fetch_history_for_user(username).await?;
        if history.is_empty() {
            tracing::info!(username = %username, "No listening history for user");
            return Ok(Vec::new());
        }

        let snapshot = self.ensure_ready().await?;
        let aggregator = PersonalizationAggregator::new(
            SimilarityRanker::new(&snapshot.store),
            self.settings.seed_tracks,
            self.settings.neighbors_per_seed,
        );
        let recommendations = aggregator.personalize(&history, n);

        tracing::info!(
            username = %username,
            plays = history.len(),
            returned = recommendations.len(),
            "Personalized recommendations computed"
        );

        Ok(recommendations)
    }

    async fn published(&self) -> Option<Snapshot> {
        match &*self.state.read().await {
            StoreState::Ready(snapshot) => Some(snapshot.clone()),
            StoreState::Unbuilt => None,
        }
    }

    async fn build_store(&self) -> AppResult<FeatureStore> {
        let rows = self.source.fetch_joined_history_features().await?;
        Ok(FeatureStore::build(rows))
    }

    /// Publishes a non-empty store under the next generation
    ///
    /// Returns `None` when the store is empty and nothing was published.
    async fn publish(&self, store: FeatureStore, generation: &mut u64) -> Option<Snapshot> {
        if store.is_empty() {
            tracing::warn!(
                skipped = store.skipped_rows(),
                "Feature store is empty, keeping previous state"
            );
            return None;
        }

        *generation += 1;
        let snapshot = Snapshot {
            store: Arc::new(store),
            generation: *generation,
        };
        *self.state.write().await = StoreState::Ready(snapshot.clone());

        tracing::info!(
            generation = snapshot.generation,
            tracks = snapshot.store.len(),
            "Feature store published"
        );

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MockListeningStore;
    use crate::error::AppError;
    use crate::models::{FeatureRow, FeatureVector, HistoryEntry};
    use chrono::{TimeZone, Utc};

    fn row(id: &str, features: FeatureVector) -> FeatureRow {
        FeatureRow {
            track_id: id.to_string(),
            track_name: Some(format!("Track {}", id)),
            artist_name: Some("Artist".to_string()),
            valence: Some(features[0]),
            tempo: Some(features[1]),
            danceability: Some(features[2]),
            energy: Some(features[3]),
            instrumentalness: Some(features[4]),
            acousticness: Some(features[5]),
        }
    }

    fn sample_rows() -> Vec<FeatureRow> {
        vec![
            row("A", [0.9, 128.0, 0.9, 0.95, 0.0, 0.05]),
            row("B", [0.85, 125.0, 0.88, 0.9, 0.02, 0.1]),
            row("C", [0.2, 70.0, 0.3, 0.2, 0.8, 0.9]),
            row("D", [0.88, 126.0, 0.86, 0.93, 0.01, 0.07]),
        ]
    }

    fn plays(ids: &[&str]) -> Vec<HistoryEntry> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| HistoryEntry {
                track_id: id.to_string(),
                played_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, i as u32, 0).unwrap(),
            })
            .collect()
    }

    fn engine(mock: MockListeningStore) -> RecommendationEngine {
        RecommendationEngine::new(Arc::new(mock), EngineSettings::default())
    }

    #[tokio::test]
    async fn test_lazy_build_happens_once() {
        let mut mock = MockListeningStore::new();
        mock.expect_fetch_joined_history_features()
            .times(1)
            .returning(|| Ok(sample_rows()));
        let engine = engine(mock);

        assert_eq!(engine.status().await.state, EngineState::Unbuilt);

        let first = engine.get_recommendations("A", 2).await.unwrap();
        let second = engine.get_recommendations("C", 2).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        let status = engine.status().await;
        assert_eq!(status.state, EngineState::Ready);
        assert_eq!(status.tracks, 4);
        assert_eq!(status.generation, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_queries_build_once() {
        let mut mock = MockListeningStore::new();
        mock.expect_fetch_joined_history_features()
            .times(1)
            .returning(|| {
                // Hold the build long enough for the other queries to queue up
                std::thread::sleep(std::time::Duration::from_millis(100));
                Ok(sample_rows())
            });
        let engine = Arc::new(engine(mock));

        let queries: Vec<_> = ["A", "B", "C", "D", "A", "C"]
            .into_iter()
            .map(|track_id| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.get_recommendations(track_id, 2).await })
            })
            .collect();

        for query in queries {
            let results = query.await.unwrap().unwrap();
            assert_eq!(results.len(), 2);
        }

        let status = engine.status().await;
        assert_eq!(status.state, EngineState::Ready);
        assert_eq!(status.generation, 1);
    }

    #[tokio::test]
    async fn test_rebuild_swaps_store_and_bumps_generation() {
        let mut mock = MockListeningStore::new();
        let mut calls = 0;
        mock.expect_fetch_joined_history_features()
            .times(2)
            .returning(move || {
                calls += 1;
                let mut rows = sample_rows();
                if calls > 1 {
                    rows.push(row("E", [0.1, 60.0, 0.2, 0.1, 0.9, 0.95]));
                }
                Ok(rows)
            });
        let engine = engine(mock);

        let before = engine.ensure_ready().await.unwrap();
        let report = engine.rebuild().await.unwrap();

        assert_eq!(before.store.len(), 4);
        assert_eq!(before.generation, 1);
        assert!(report.published);
        assert_eq!(report.built_tracks, 5);
        assert_eq!(report.status.tracks, 5);
        assert_eq!(report.status.generation, 2);
        // Readers holding the old snapshot keep a consistent view
        assert!(before.store.get("E").is_none());
    }

    #[tokio::test]
    async fn test_unknown_track_is_empty_not_error() {
        let mut mock = MockListeningStore::new();
        mock.expect_fetch_joined_history_features()
            .returning(|| Ok(sample_rows()));
        let engine = engine(mock);

        let results = engine.get_recommendations("missing", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_source_stays_unbuilt() {
        let mut mock = MockListeningStore::new();
        mock.expect_fetch_joined_history_features()
            .times(2)
            .returning(|| Ok(Vec::new()));
        let engine = engine(mock);

        assert!(engine.get_recommendations("A", 5).await.unwrap().is_empty());
        assert!(engine.get_recommendations("A", 5).await.unwrap().is_empty());
        assert_eq!(engine.status().await.state, EngineState::Unbuilt);
    }

    #[tokio::test]
    async fn test_empty_rebuild_keeps_previous_store() {
        let mut mock = MockListeningStore::new();
        let mut calls = 0;
        mock.expect_fetch_joined_history_features()
            .times(2)
            .returning(move || {
                calls += 1;
                if calls == 1 {
                    return Ok(sample_rows());
                }
                let mut incomplete = row("E", [0.1, 60.0, 0.2, 0.1, 0.9, 0.95]);
                incomplete.tempo = None;
                Ok(vec![incomplete])
            });
        let engine = engine(mock);

        engine.ensure_ready().await.unwrap();
        let report = engine.rebuild().await.unwrap();

        assert!(!report.published);
        assert_eq!(report.built_tracks, 0);
        assert_eq!(report.built_skipped_rows, 1);
        assert_eq!(report.status.state, EngineState::Ready);
        assert_eq!(report.status.tracks, 4);
        assert_eq!(report.status.generation, 1);
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let mut mock = MockListeningStore::new();
        mock.expect_fetch_joined_history_features()
            .returning(|| Err(AppError::Database(sqlx::Error::PoolTimedOut)));
        let engine = engine(mock);

        let result = engine.get_recommendations("A", 5).await;
        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(engine.status().await.state, EngineState::Unbuilt);
    }

    #[tokio::test]
    async fn test_personalized_from_history() {
        let mut mock = MockListeningStore::new();
        mock.expect_fetch_history_for_user()
            .withf(|username| username == "alice")
            .returning(|_| Ok(plays(&["A", "A", "A", "B", "B", "C"])));
        mock.expect_fetch_joined_history_features()
            .times(1)
            .returning(|| Ok(sample_rows()));
        let engine = engine(mock);

        let results = engine
            .get_personalized_recommendations("alice", 20)
            .await
            .unwrap();

        assert!(!results.is_empty());
        let mut ids: Vec<&str> = results.iter().map(|r| r.track_id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), results.len());
        assert!(results.windows(2).all(|w| w[0].frequency >= w[1].frequency));
    }

    #[tokio::test]
    async fn test_personalized_without_history_skips_build() {
        let mut mock = MockListeningStore::new();
        mock.expect_fetch_history_for_user()
            .returning(|_| Ok(Vec::new()));
        mock.expect_fetch_joined_history_features().never();
        let engine = engine(mock);

        let results = engine
            .get_personalized_recommendations("nobody", 20)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
