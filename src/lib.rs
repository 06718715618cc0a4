#![deny(missing_docs)]
//! # ubr
//!
//! `ubr` implements user-based nearest-neighbour recommenders over implicit
//! play-count data: given the items a user has played, the model finds the
//! `k` most similar users under a pluggable similarity metric and folds
//! their play counts into a ranked list of items the user has not seen.
//! Precision@10 evaluation against held-out data is built in, together with
//! random and global-popularity baselines.
//!
//! ## Example
//! ```rust
//! # extern crate ubr;
//! use std::collections::HashMap;
//!
//! use ubr::data::TrainingSet;
//! use ubr::models::knn::Hyperparameters;
//! use ubr::similarity::Metric;
//!
//! let mut users = HashMap::new();
//! users.insert(0, vec![(0, 5.0), (1, 3.0)].into_iter().collect());
//! users.insert(1, vec![(0, 4.0), (2, 2.0)].into_iter().collect());
//! let training = TrainingSet::from(users);
//!
//! let model = Hyperparameters::new(1).metric(Metric::DotProduct).build();
//!
//! let recommendations = model.recommend(&training, training.get(0).unwrap());
//! assert_eq!(recommendations, vec![2]);
//! ```
#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate failure;

extern crate itertools;
extern crate rand;
extern crate rayon;
extern crate serde;
extern crate siphasher;

#[cfg(test)]
extern crate tempfile;

pub mod data;
pub mod datasets;
pub mod evaluation;
pub mod models;
pub mod similarity;

/// Alias for user identifiers.
pub type UserId = usize;
/// Alias for item identifiers.
pub type ItemId = usize;

/// Number of items in a ranked recommendation list.
pub const NUM_RECOMMENDATIONS: usize = 10;

/// Configuration error types.
#[derive(Debug, Fail)]
pub enum ConfigError {
    /// The requested similarity metric tag is not recognized.
    #[fail(display = "Unknown similarity metric: {}.", _0)]
    UnknownMetric(String),
}
