//! Similarity metrics over sparse feature vectors.
//!
//! All three metrics accept vectors with any degree of key overlap,
//! including none at all, and tolerate negative weights such as those
//! produced by mean-centering.
use std::str::FromStr;

use data::FeatureVector;
use ConfigError;

/// Similarity score assigned to a pair of identical vectors under the
/// inverse distance metric. Large but finite, so that orderings over
/// candidate pools stay well-defined.
pub const IDENTICAL_SIMILARITY: f32 = 4_294_967_296.0;

/// The similarity metric used to compare two users' feature vectors.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Metric {
    /// One over the Euclidean distance across the union of keys, with
    /// missing keys treated as zero. Identical vectors score
    /// [`IDENTICAL_SIMILARITY`](constant.IDENTICAL_SIMILARITY.html).
    InverseDistance,
    /// Sum of products over shared keys, with no normalization: denser,
    /// heavier vectors dominate.
    DotProduct,
    /// Dot product divided by the product of the two squared L2 norms (not
    /// their square roots). Zero when either norm is zero.
    Cosine,
}

impl Metric {
    /// Score the similarity between two feature vectors.
    pub fn similarity(&self, a: &FeatureVector, b: &FeatureVector) -> f32 {
        match *self {
            Metric::InverseDistance => inverse_distance(a, b),
            Metric::DotProduct => dot_product(a, b),
            Metric::Cosine => cosine(a, b),
        }
    }
}

impl FromStr for Metric {
    type Err = ConfigError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string {
            "inverse-distance" => Ok(Metric::InverseDistance),
            "dot-product" => Ok(Metric::DotProduct),
            "cosine" => Ok(Metric::Cosine),
            _ => Err(ConfigError::UnknownMetric(string.to_owned())),
        }
    }
}

fn inverse_distance(a: &FeatureVector, b: &FeatureVector) -> f32 {
    let mut sum_squares = 0.0;

    for (key, value) in a {
        match b.get(key) {
            Some(other) => sum_squares += (value - other).powi(2),
            None => sum_squares += value.powi(2),
        }
    }

    for (key, value) in b {
        if !a.contains_key(key) {
            sum_squares += value.powi(2);
        }
    }

    if sum_squares == 0.0 {
        IDENTICAL_SIMILARITY
    } else {
        1.0 / sum_squares.sqrt()
    }
}

fn dot_product(a: &FeatureVector, b: &FeatureVector) -> f32 {
    a.iter()
        .filter_map(|(key, value)| b.get(key).map(|other| value * other))
        .sum()
}

fn cosine(a: &FeatureVector, b: &FeatureVector) -> f32 {
    let norm_squared_a: f32 = a.values().map(|value| value.powi(2)).sum();
    let norm_squared_b: f32 = b.values().map(|value| value.powi(2)).sum();
    let denominator = norm_squared_a * norm_squared_b;

    if denominator == 0.0 {
        0.0
    } else {
        dot_product(a, b) / denominator
    }
}
