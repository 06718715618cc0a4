//! User-based nearest-neighbour recommendations.
//!
//! Recommendations for a query vector are built in two steps: an exact
//! similarity scan over the whole training set selects the `k` most similar
//! users, and their play counts are folded into a single ranking over items
//! the query has not seen. Both steps are deterministic: similarity and
//! score ties are broken by ascending id.
use std::cmp::Ordering;
use std::collections::HashMap;

use itertools::Itertools;

use data::{FeatureVector, TrainingSet};
use similarity::Metric;
use {ItemId, UserId, NUM_RECOMMENDATIONS};

/// Hyperparameters describing a user-based nearest-neighbour model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hyperparameters {
    k: usize,
    weighted: bool,
    metric: Metric,
}

impl Hyperparameters {
    /// Build new hyperparameters aggregating over `k` neighbours.
    pub fn new(k: usize) -> Self {
        Hyperparameters {
            k,
            weighted: false,
            metric: Metric::InverseDistance,
        }
    }

    /// Weight neighbour contributions by raw similarity instead of the
    /// default decay by neighbour rank position.
    pub fn weighted(mut self, weighted: bool) -> Self {
        self.weighted = weighted;
        self
    }

    /// Set the similarity metric.
    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Build the model.
    pub fn build(self) -> UserKnnModel {
        UserKnnModel { hyper: self }
    }
}

/// User-based k-nearest-neighbour recommendation model.
#[derive(Clone, Debug)]
pub struct UserKnnModel {
    hyper: Hyperparameters,
}

impl UserKnnModel {
    /// Select up to `k` nearest neighbours for a query vector.
    ///
    /// Every training user whose vector is not value-equal to the query
    /// vector is a candidate; a user whose history is identical to the
    /// query's is excluded even when it belongs to somebody else. Neighbours
    /// are ordered by descending similarity, ties by ascending user id. The
    /// similarity map over the full candidate pool is returned alongside
    /// the selection.
    pub fn select_neighbors(
        &self,
        training: &TrainingSet,
        query: &FeatureVector,
    ) -> (Vec<UserId>, HashMap<UserId, f32>) {
        let mut similarities = HashMap::with_capacity(training.len());

        for (&user_id, vector) in training.iter() {
            if vector == query {
                continue;
            }

            similarities.insert(user_id, self.hyper.metric.similarity(query, vector));
        }

        let neighbors = similarities
            .iter()
            .sorted_by(|a, b| {
                b.1
                    .partial_cmp(a.1)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.0.cmp(b.0))
            })
            .take(self.hyper.k)
            .map(|(&user_id, _)| user_id)
            .collect();

        (neighbors, similarities)
    }

    /// Aggregate neighbour preferences into a ranked recommendation list.
    ///
    /// Neighbours contribute their items in the order given: under the
    /// default policy an item's weight is divided by its neighbour's
    /// 1-indexed position in `neighbors`, under the weighted policy it is
    /// multiplied by that neighbour's similarity instead. Items already
    /// present in the query vector are skipped. At most ten items are
    /// returned, ordered by descending accumulated score, ties by ascending
    /// item id.
    pub fn rank(
        &self,
        training: &TrainingSet,
        query: &FeatureVector,
        neighbors: &[UserId],
        similarities: &HashMap<UserId, f32>,
    ) -> Vec<ItemId> {
        let mut scores: HashMap<ItemId, f32> = HashMap::new();

        for (position, user_id) in neighbors.iter().enumerate() {
            let vector = match training.get(*user_id) {
                Some(vector) => vector,
                None => continue,
            };

            let rank_position = (position + 1) as f32;
            let similarity = similarities.get(user_id).cloned().unwrap_or(0.0);

            for (&item_id, &weight) in vector {
                if query.contains_key(&item_id) {
                    continue;
                }

                let contribution = if self.hyper.weighted {
                    weight * similarity
                } else {
                    weight / rank_position
                };

                *scores.entry(item_id).or_insert(0.0) += contribution;
            }
        }

        scores
            .iter()
            .sorted_by(|a, b| {
                b.1
                    .partial_cmp(a.1)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.0.cmp(b.0))
            })
            .take(NUM_RECOMMENDATIONS)
            .map(|(&item_id, _)| item_id)
            .collect()
    }

    /// Select neighbours and rank their items in one step.
    pub fn recommend(&self, training: &TrainingSet, query: &FeatureVector) -> Vec<ItemId> {
        let (neighbors, similarities) = self.select_neighbors(training, query);

        self.rank(training, query, &neighbors, &similarities)
    }
}
