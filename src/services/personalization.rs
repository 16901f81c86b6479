use std::collections::HashMap;

use crate::{
    models::{HistoryEntry, PersonalizedTrack},
    services::similarity::SimilarityRanker,
};

/// Merges per-seed neighbour lists into one personalized ranking
#[derive(Debug, Clone, Copy)]
pub struct PersonalizationAggregator<'a> {
    ranker: SimilarityRanker<'a>,
    seed_tracks: usize,
    neighbors_per_seed: usize,
}

impl<'a> PersonalizationAggregator<'a> {
    pub fn new(ranker: SimilarityRanker<'a>, seed_tracks: usize, neighbors_per_seed: usize) -> Self {
        Self {
            ranker,
            seed_tracks,
            neighbors_per_seed,
        }
    }

    /// Builds up to `n` recommendations from a user's listening history
    ///
    /// Seeds are the most-played tracks; candidates are ranked by how many seed
    /// neighbour lists they appear in, then by first appearance.
    pub fn personalize(&self, history: &[HistoryEntry], n: usize) -> Vec<PersonalizedTrack> {
        let seeds = top_tracks(history, self.seed_tracks);
        if seeds.is_empty() {
            return Vec::new();
        }

        let mut pool: Vec<PersonalizedTrack> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut seeds_found = 0;

        for seed in &seeds {
            let Some(neighbors) = self.ranker.recommend(seed, self.neighbors_per_seed) else {
                tracing::warn!(track_id = %seed, "Seed track not found in feature store");
                continue;
            };
            seeds_found += 1;

            for candidate in neighbors {
                match index.get(&candidate.track_id) {
                    Some(&pos) => pool[pos].frequency += 1,
                    None => {
                        index.insert(candidate.track_id.clone(), pool.len());
                        pool.push(PersonalizedTrack {
                            track_id: candidate.track_id,
                            track_name: candidate.track_name,
                            artist_name: candidate.artist_name,
                            frequency: 1,
                        });
                    }
                }
            }
        }

        tracing::debug!(
            seeds = seeds.len(),
            seeds_found,
            candidates = pool.len(),
            "Seed expansion complete"
        );

        // Stable, so ties keep first-seen order
        pool.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        pool.truncate(n);
        pool
    }
}

/// Most-played track ids, ties broken by first occurrence in `history`
pub fn top_tracks(history: &[HistoryEntry], limit: usize) -> Vec<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for entry in history {
        match index.get(entry.track_id.as_str()) {
            Some(&pos) => counts[pos].1 += 1,
            None => {
                index.insert(entry.track_id.as_str(), counts.len());
                counts.push((entry.track_id.as_str(), 1));
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(limit)
        .map(|(track_id, _)| track_id.to_string())
        .collect()
}
