use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{PersonalizedTrack, SimilarTrack},
    services::engine::RecommendationEngine,
};

/// Similar tracks for `track_id`, served from the cache when one is configured
///
/// Entries are keyed by store generation, so a rebuild never serves lists
/// computed from an older store.
pub async fn similar_tracks(
    engine: &RecommendationEngine,
    cache: Option<&Cache>,
    ttl: u64,
    track_id: &str,
    n: usize,
) -> AppResult<Vec<SimilarTrack>> {
    if n == 0 {
        return Ok(Vec::new());
    }

    let snapshot = engine.ensure_ready().await?;

    let Some(cache) = cache else {
        return Ok(RecommendationEngine::recommend_from(&snapshot, track_id, n));
    };

    let key = CacheKey::SimilarTracks {
        track_id: track_id.to_string(),
        n,
        generation: snapshot.generation,
    };

    cached!(cache, key, ttl, async {
        Ok::<_, AppError>(RecommendationEngine::recommend_from(&snapshot, track_id, n))
    })
}

/// Personalized recommendations for `username`
///
/// Not cached: the result depends on listening history that changes between
/// rebuilds.
pub async fn personalized_tracks(
    engine: &RecommendationEngine,
    username: &str,
    n: usize,
) -> AppResult<Vec<PersonalizedTrack>> {
    if n == 0 {
        return Ok(Vec::new());
    }

    engine.get_personalized_recommendations(username, n).await
}
