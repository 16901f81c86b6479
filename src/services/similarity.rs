use crate::{
    models::{FeatureVector, SimilarTrack},
    services::feature_store::{vector_norm, FeatureStore},
};

/// Cosine similarity between two feature vectors
///
/// Defined as 0 when either vector has zero norm.
pub fn cosine_similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    cosine_with_norms(a, vector_norm(a), b, vector_norm(b))
}

fn cosine_with_norms(a: &FeatureVector, norm_a: f64, b: &FeatureVector, norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    // Adding 0.0 folds -0.0 into 0.0 so ties compare equal under total_cmp
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) + 0.0
}

/// Ranks stored tracks by similarity to a query track
#[derive(Debug, Clone, Copy)]
pub struct SimilarityRanker<'a> {
    store: &'a FeatureStore,
}

impl<'a> SimilarityRanker<'a> {
    pub fn new(store: &'a FeatureStore) -> Self {
        Self { store }
    }

    /// Returns up to `n` tracks most similar to `track_id`
    ///
    /// `None` means the track is not in the store. Every row sharing the query's
    /// track id is excluded from the result. Equal scores keep store order.
    pub fn recommend(&self, track_id: &str, n: usize) -> Option<Vec<SimilarTrack>> {
        let query_idx = self.store.position(track_id)?;
        let tracks = self.store.tracks();
        let norms = self.store.norms();
        let query = &tracks[query_idx].features;
        let query_norm = norms[query_idx];

        let mut scored: Vec<(usize, f64)> = tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.track_id != track_id)
            .map(|(idx, t)| {
                (
                    idx,
                    cosine_with_norms(query, query_norm, &t.features, norms[idx]),
                )
            })
            .collect();

        // Stable, so ties stay in store order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(n);

        Some(
            scored
                .into_iter()
                .map(|(idx, score)| {
                    let track = &tracks[idx];
                    SimilarTrack {
                        track_id: track.track_id.clone(),
                        track_name: track.track_name.clone(),
                        artist_name: track.artist_name.clone(),
                        score,
                    }
                })
                .collect(),
        )
    }
}
