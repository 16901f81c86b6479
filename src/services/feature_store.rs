use crate::models::{FeatureRow, FeatureVector, TrackRecord, FEATURE_COUNT};

/// Per-dimension standardization parameters fitted at build time
#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    pub means: FeatureVector,
    /// Population standard deviations; 0 marks a constant dimension
    pub std_devs: FeatureVector,
    /// Largest absolute value per dimension, used to keep sums in range
    scales: FeatureVector,
}

impl Normalization {
    /// Fits means and population standard deviations over `vectors`
    ///
    /// Values are divided by the dimension's largest magnitude before summing,
    /// so finite inputs near `f64::MAX` never overflow. A dimension whose
    /// values are all equal, or whose deviation is not a finite positive
    /// number, gets a standard deviation of exactly 0.
    pub fn fit(vectors: &[FeatureVector]) -> Self {
        let mut means = [0.0; FEATURE_COUNT];
        let mut std_devs = [0.0; FEATURE_COUNT];
        let mut scales = [1.0; FEATURE_COUNT];

        if vectors.is_empty() {
            return Self {
                means,
                std_devs,
                scales,
            };
        }

        let count = vectors.len() as f64;
        for dim in 0..FEATURE_COUNT {
            let scale = vectors.iter().map(|v| v[dim].abs()).fold(0.0, f64::max);
            if !(scale.is_finite() && scale > 0.0) {
                continue;
            }
            scales[dim] = scale;

            let first = vectors[0][dim];
            let constant = vectors.iter().all(|v| v[dim] == first);

            let scaled_mean = vectors.iter().map(|v| v[dim] / scale).sum::<f64>() / count;
            means[dim] = scaled_mean * scale;

            if constant {
                continue;
            }

            let scaled_variance = vectors
                .iter()
                .map(|v| (v[dim] / scale - scaled_mean).powi(2))
                .sum::<f64>()
                / count;
            let std_dev = scaled_variance.sqrt() * scale;
            if std_dev.is_finite() && std_dev > 0.0 {
                std_devs[dim] = std_dev;
            }
        }

        Self {
            means,
            std_devs,
            scales,
        }
    }

    /// Standardizes one vector with the fitted parameters
    pub fn apply(&self, features: &FeatureVector) -> FeatureVector {
        let mut scaled = [0.0; FEATURE_COUNT];
        for dim in 0..FEATURE_COUNT {
            let std_dev = self.std_devs[dim];
            if std_dev > 0.0 {
                let scale = self.scales[dim];
                scaled[dim] =
                    (features[dim] / scale - self.means[dim] / scale) / (std_dev / scale);
            }
        }
        scaled
    }
}

/// In-memory table of normalized track feature vectors
///
/// Immutable once built. A rebuild produces a fresh store that replaces this
/// one wholesale.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    tracks: Vec<TrackRecord>,
    norms: Vec<f64>,
    normalization: Normalization,
    skipped_rows: usize,
}

impl FeatureStore {
    /// Creates a store with no tracks
    pub fn empty() -> Self {
        Self::from_records(Vec::new(), 0)
    }

    /// Builds a normalized store from joined history/audio-feature rows
    ///
    /// Rows with a missing or non-finite feature are logged and skipped.
    pub fn build(rows: Vec<FeatureRow>) -> Self {
        let total = rows.len();
        let mut records = Vec::with_capacity(total);
        let mut skipped_rows = 0;

        for row in rows {
            match row.into_record() {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping incomplete feature row");
                    skipped_rows += 1;
                }
            }
        }

        let store = Self::from_records(records, skipped_rows);

        tracing::info!(
            rows = total,
            tracks = store.len(),
            skipped = skipped_rows,
            "Feature store built"
        );

        store
    }

    fn from_records(mut records: Vec<TrackRecord>, skipped_rows: usize) -> Self {
        let raw: Vec<FeatureVector> = records.iter().map(|r| r.features).collect();
        let normalization = Normalization::fit(&raw);

        for record in &mut records {
            record.features = normalization.apply(&record.features);
        }

        let norms = records.iter().map(|r| vector_norm(&r.features)).collect();

        Self {
            tracks: records,
            norms,
            normalization,
            skipped_rows,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Normalized tracks in store order
    pub fn tracks(&self) -> &[TrackRecord] {
        &self.tracks
    }

    /// Euclidean norm of each normalized vector, parallel to [`Self::tracks`]
    pub fn norms(&self) -> &[f64] {
        &self.norms
    }

    pub fn normalization(&self) -> &Normalization {
        &self.normalization
    }

    /// Rows rejected during the build
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Store index of the first row carrying `track_id`
    pub fn position(&self, track_id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.track_id == track_id)
    }

    pub fn get(&self, track_id: &str) -> Option<&TrackRecord> {
        self.position(track_id).map(|idx| &self.tracks[idx])
    }
}

/// Euclidean norm of a feature vector
pub fn vector_norm(v: &FeatureVector) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}
