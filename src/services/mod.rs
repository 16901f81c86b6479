pub mod engine;
pub mod feature_store;
pub mod personalization;
pub mod recommendations;
pub mod similarity;

pub use engine::{
    EngineSettings, EngineState, EngineStatus, RebuildReport, RecommendationEngine, Snapshot,
};
pub use feature_store::FeatureStore;
pub use personalization::PersonalizationAggregator;
pub use similarity::{cosine_similarity, SimilarityRanker};
