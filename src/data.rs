//! Containers for play-count interaction data.
use std::collections::hash_map;
use std::collections::{HashMap, HashSet};

use super::{ItemId, UserId};

/// A sparse user feature vector, mapping item ids to interaction weights.
///
/// A key's presence means the user has interacted with that item; absence
/// means the interaction is unknown, not zero. Weights are non-negative play
/// counts on load, but become fractional (and possibly negative) after
/// mean-centering.
pub type FeatureVector = HashMap<ItemId, f32>;

/// A training set of play-count feature vectors, one per user.
///
/// Immutable once queries begin; the only sanctioned mutation is a single
/// [`normalize`](#method.normalize) pass straight after loading.
pub struct TrainingSet {
    users: HashMap<UserId, FeatureVector>,
}

impl TrainingSet {
    /// Number of users in the training set.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the training set contains no users.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Get a user's feature vector.
    pub fn get(&self, user_id: UserId) -> Option<&FeatureVector> {
        self.users.get(&user_id)
    }

    /// Iterate over all (user id, feature vector) pairs.
    pub fn iter(&self) -> hash_map::Iter<UserId, FeatureVector> {
        self.users.iter()
    }

    /// Mean-center every user's vector in place.
    ///
    /// Subtracts the user's mean weight from each of their entries. Apply at
    /// most once, after loading and before any similarity computation, so
    /// that query vectors and candidate vectors are drawn from the same
    /// normalized set. Empty vectors are left untouched.
    pub fn normalize(&mut self) {
        for vector in self.users.values_mut() {
            if vector.is_empty() {
                continue;
            }

            let mean = vector.values().sum::<f32>() / vector.len() as f32;
            for weight in vector.values_mut() {
                *weight -= mean;
            }
        }
    }
}

impl From<HashMap<UserId, FeatureVector>> for TrainingSet {
    fn from(users: HashMap<UserId, FeatureVector>) -> Self {
        TrainingSet { users }
    }
}

/// Held-out relevant items per user, the ground truth for precision scoring.
pub struct HeldOut {
    users: HashMap<UserId, HashSet<ItemId>>,
}

impl HeldOut {
    /// Number of users with held-out items.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no users have held-out items.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Get a user's held-out item set.
    pub fn get(&self, user_id: UserId) -> Option<&HashSet<ItemId>> {
        self.users.get(&user_id)
    }
}

impl From<HashMap<UserId, HashSet<ItemId>>> for HeldOut {
    fn from(users: HashMap<UserId, HashSet<ItemId>>) -> Self {
        HeldOut { users }
    }
}

/// Display labels for items.
///
/// Labels are consulted for reporting and for label-filtered queries;
/// scoring itself never needs the catalog.
pub struct Catalog {
    labels: HashMap<ItemId, String>,
}

impl Catalog {
    /// Number of items in the catalog.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Look up an item's display label.
    pub fn label(&self, item_id: ItemId) -> Option<&str> {
        self.labels.get(&item_id).map(|label| label.as_str())
    }

    /// Iterate over all catalog item ids.
    pub fn item_ids(&self) -> hash_map::Keys<ItemId, String> {
        self.labels.keys()
    }
}

impl From<HashMap<ItemId, String>> for Catalog {
    fn from(labels: HashMap<ItemId, String>) -> Self {
        Catalog { labels }
    }
}
