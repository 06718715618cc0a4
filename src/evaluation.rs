//! Precision@10 evaluation against held-out data, with random and
//! global-popularity baselines.
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::hash::Hasher;

use itertools::Itertools;
use rand::{Rng, SeedableRng, XorShiftRng};
use rayon::prelude::*;
use siphasher::sip::SipHasher;

use data::{Catalog, FeatureVector, HeldOut, TrainingSet};
use models::knn::UserKnnModel;
use {ItemId, UserId, NUM_RECOMMENDATIONS};

/// Precision figures from a full evaluation run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Mean precision@10 of the model's recommendations.
    pub precision: f32,
    /// Mean precision@10 of the random baseline.
    pub precision_random: f32,
    /// Mean precision@10 of the global-popularity baseline.
    pub precision_popularity: f32,
}

/// The outcome of evaluating a single user.
#[derive(Clone, Debug)]
pub struct UserEvaluation {
    /// The user's highest-weight known items, at most ten.
    pub top_played: Vec<ItemId>,
    /// The recommended items, at most ten.
    pub recommended: Vec<ItemId>,
    /// Precision@10 of the recommendations against the held-out items.
    pub precision: f32,
}

/// Evaluation error types.
#[derive(Debug, Fail)]
pub enum EvaluationError {
    /// The queried user does not exist in the training set.
    #[fail(display = "User {} is not present in the training set.", _0)]
    UnknownUser(UserId),
    /// The queried user has no held-out interactions to score against.
    #[fail(display = "User {} has no held-out interactions.", _0)]
    MissingHeldOut(UserId),
    /// No user appears in both the training and held-out sets.
    #[fail(display = "No users are present in both the training and held-out sets.")]
    NoOverlappingUsers,
}

const RNG_KEY: u64 = 0x9e37_79b9_7f4a_7c15;

/// Derive a per-user generator from the run seed, so that the random
/// baseline stays reproducible when users are scored in parallel.
fn user_rng(seed: u64, user_id: UserId) -> XorShiftRng {
    let mut hasher = SipHasher::new_with_keys(seed, seed ^ RNG_KEY);
    hasher.write_usize(user_id);

    let mut seed_bytes = [0; 16];
    seed_bytes[..8].copy_from_slice(&hasher.finish().to_le_bytes());
    // XorShiftRng rejects the all-zero seed
    seed_bytes[8..].copy_from_slice(&RNG_KEY.to_le_bytes());

    XorShiftRng::from_seed(seed_bytes)
}

fn precision_at_10(recommended: &[ItemId], relevant: &HashSet<ItemId>) -> f32 {
    let hits = recommended
        .iter()
        .filter(|item_id| relevant.contains(*item_id))
        .count();

    hits as f32 / NUM_RECOMMENDATIONS as f32
}

/// Rank all items by total play count across the training set, ties broken
/// by ascending item id. Computed once per evaluation run and threaded
/// through per-user scoring.
fn popularity_ranking(training: &TrainingSet) -> Vec<ItemId> {
    let mut totals: HashMap<ItemId, f32> = HashMap::new();

    for (_, vector) in training.iter() {
        for (&item_id, &weight) in vector {
            *totals.entry(item_id).or_insert(0.0) += weight;
        }
    }

    totals
        .iter()
        .sorted_by(|a, b| {
            b.1
                .partial_cmp(a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        })
        .map(|(&item_id, _)| item_id)
        .collect()
}

/// Evaluate mean precision@10 over every user present in both the training
/// and held-out sets, together with the random and popularity baselines.
///
/// The random baseline scores ten unknown catalog items drawn from a
/// generator derived from `seed` and the user id; the popularity baseline
/// scores the ten globally most played items the user does not know. Each
/// precision sum is averaged over one fewer than the number of scored
/// users, so a run over a single user yields non-finite averages.
pub fn evaluate_all(
    model: &UserKnnModel,
    training: &TrainingSet,
    held_out: &HeldOut,
    catalog: &Catalog,
    seed: u64,
) -> Result<EvaluationResult, EvaluationError> {
    let ranking = popularity_ranking(training);

    let mut user_ids: Vec<UserId> = training
        .iter()
        .map(|(&user_id, _)| user_id)
        .filter(|&user_id| held_out.get(user_id).is_some())
        .collect();
    user_ids.sort();

    if user_ids.is_empty() {
        return Err(EvaluationError::NoOverlappingUsers);
    }

    let scores: Vec<(f32, f32, f32)> = user_ids
        .par_iter()
        .filter_map(|&user_id| {
            let query = training.get(user_id)?;
            let relevant = held_out.get(user_id)?;

            let recommended = model.recommend(training, query);
            let precision = precision_at_10(&recommended, relevant);

            let mut rng = user_rng(seed, user_id);
            let mut pool: Vec<ItemId> = catalog
                .item_ids()
                .filter(|item_id| !query.contains_key(*item_id))
                .cloned()
                .collect();
            // hash iteration order must not leak through the seeded shuffle
            pool.sort();
            rng.shuffle(&mut pool);
            pool.truncate(NUM_RECOMMENDATIONS);
            let precision_random = precision_at_10(&pool, relevant);

            let top_items: Vec<ItemId> = ranking
                .iter()
                .filter(|item_id| !query.contains_key(*item_id))
                .take(NUM_RECOMMENDATIONS)
                .cloned()
                .collect();
            let precision_popularity = precision_at_10(&top_items, relevant);

            Some((precision, precision_random, precision_popularity))
        })
        .collect();

    let denominator = (scores.len() - 1) as f32;

    let mut precision = 0.0;
    let mut precision_random = 0.0;
    let mut precision_popularity = 0.0;

    for &(model_score, random_score, popularity_score) in &scores {
        precision += model_score;
        precision_random += random_score;
        precision_popularity += popularity_score;
    }

    Ok(EvaluationResult {
        precision: precision / denominator,
        precision_random: precision_random / denominator,
        precision_popularity: precision_popularity / denominator,
    })
}

/// Evaluate a single user: their highest-weight known items, their
/// recommendations, and precision@10 against their held-out items.
pub fn evaluate_user(
    model: &UserKnnModel,
    training: &TrainingSet,
    held_out: &HeldOut,
    user_id: UserId,
) -> Result<UserEvaluation, EvaluationError> {
    let query = training
        .get(user_id)
        .ok_or_else(|| EvaluationError::UnknownUser(user_id))?;
    let relevant = held_out
        .get(user_id)
        .ok_or_else(|| EvaluationError::MissingHeldOut(user_id))?;

    let top_played = query
        .iter()
        .sorted_by(|a, b| {
            b.1
                .partial_cmp(a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        })
        .take(NUM_RECOMMENDATIONS)
        .map(|(&item_id, _)| item_id)
        .collect();

    let recommended = model.recommend(training, query);
    let precision = precision_at_10(&recommended, relevant);

    Ok(UserEvaluation {
        top_played,
        recommended,
        precision,
    })
}

/// Recommend for a pseudo-user built from a catalog label filter.
///
/// Every training item whose label contains `filter` case-insensitively
/// joins the pseudo-user's vector at weight 1.0; items without a catalog
/// entry never match. The usual selection and ranking pipeline then runs
/// unchanged, so matching items are excluded from the recommendations. A
/// filter with no matches produces an empty query vector, which is
/// degenerate but well-defined.
pub fn evaluate_artist(
    model: &UserKnnModel,
    training: &TrainingSet,
    catalog: &Catalog,
    filter: &str,
) -> Vec<ItemId> {
    let needle = filter.to_lowercase();
    let mut query = FeatureVector::new();

    for (_, vector) in training.iter() {
        for (&item_id, _) in vector {
            if query.contains_key(&item_id) {
                continue;
            }

            if let Some(label) = catalog.label(item_id) {
                if label.to_lowercase().contains(&needle) {
                    query.insert(item_id, 1.0);
                }
            }
        }
    }

    model.recommend(training, &query)
}

#[cfg(test)]
mod tests {
    use super::*;

    use models::knn::Hyperparameters;
    use similarity::Metric;

    fn fixture() -> (TrainingSet, HeldOut, Catalog) {
        let mut users: HashMap<UserId, FeatureVector> = HashMap::new();
        users.insert(1, vec![(1, 5.0), (2, 3.0)].into_iter().collect());
        users.insert(2, vec![(1, 4.0), (3, 2.0)].into_iter().collect());
        users.insert(3, vec![(2, 2.0), (3, 1.0)].into_iter().collect());

        let mut held: HashMap<UserId, HashSet<ItemId>> = HashMap::new();
        held.insert(1, vec![3].into_iter().collect());
        held.insert(2, vec![2].into_iter().collect());
        held.insert(3, vec![4].into_iter().collect());

        let mut labels: HashMap<ItemId, String> = HashMap::new();
        labels.insert(1, "Bruno Mars - Grenade".to_string());
        labels.insert(2, "Adele - Hello".to_string());
        labels.insert(3, "Bruno Mars - The Lazy Song".to_string());
        labels.insert(4, "Eagles - Hotel California".to_string());

        (
            TrainingSet::from(users),
            HeldOut::from(held),
            Catalog::from(labels),
        )
    }

    #[test]
    fn averages_are_taken_over_one_fewer_than_the_user_count() {
        let (training, held_out, catalog) = fixture();
        let model = Hyperparameters::new(2).metric(Metric::DotProduct).build();

        let result = evaluate_all(&model, &training, &held_out, &catalog, 42).unwrap();

        // per-user precisions are 0.1, 0.1 and 0.0; the sums divide by two
        assert!((result.precision - 0.1).abs() < 1e-6);
        assert!((result.precision_popularity - 0.1).abs() < 1e-6);
        // every user's unknown-item pool holds two items, so the random
        // baseline hits each user's single held-out item
        assert!((result.precision_random - 0.15).abs() < 1e-6);
    }

    #[test]
    fn evaluation_is_deterministic_for_a_fixed_seed() {
        let (training, held_out, _) = fixture();

        let mut labels: HashMap<ItemId, String> = HashMap::new();
        for item_id in 1..30 {
            labels.insert(item_id, format!("Artist {} - Title {}", item_id, item_id));
        }
        let catalog = Catalog::from(labels);

        let model = Hyperparameters::new(2).metric(Metric::Cosine).build();

        let first = evaluate_all(&model, &training, &held_out, &catalog, 7).unwrap();
        let second = evaluate_all(&model, &training, &held_out, &catalog, 7).unwrap();

        assert_eq!(first.precision, second.precision);
        assert_eq!(first.precision_random, second.precision_random);
        assert_eq!(first.precision_popularity, second.precision_popularity);
    }

    #[test]
    fn per_user_precisions_stay_within_the_unit_interval() {
        let (training, held_out, catalog) = fixture();
        let model = Hyperparameters::new(2).weighted(true).metric(Metric::Cosine).build();

        let result = evaluate_all(&model, &training, &held_out, &catalog, 3).unwrap();

        // three users, divisor two: averages are bounded by 3/2
        for &score in &[
            result.precision,
            result.precision_random,
            result.precision_popularity,
        ] {
            assert!(score >= 0.0);
            assert!(score <= 1.5);
        }
    }

    #[test]
    fn overlapping_users_are_required() {
        let (training, _, catalog) = fixture();
        let held_out = HeldOut::from(HashMap::new());
        let model = Hyperparameters::new(2).build();

        match evaluate_all(&model, &training, &held_out, &catalog, 42) {
            Err(EvaluationError::NoOverlappingUsers) => {}
            other => panic!("Unexpected result: {:?}", other.map(|r| r.precision)),
        }
    }

    #[test]
    fn popularity_orders_by_total_plays_then_item_id() {
        let mut users: HashMap<UserId, FeatureVector> = HashMap::new();
        users.insert(1, vec![(1, 3.0), (7, 2.0)].into_iter().collect());
        users.insert(2, vec![(5, 2.0), (1, 1.0)].into_iter().collect());
        let training = TrainingSet::from(users);

        assert_eq!(popularity_ranking(&training), vec![1, 5, 7]);
    }

    #[test]
    fn popularity_baseline_excludes_known_items() {
        let mut users: HashMap<UserId, FeatureVector> = HashMap::new();
        users.insert(1, vec![(10, 60.0), (20, 50.0)].into_iter().collect());
        users.insert(2, vec![(10, 40.0), (30, 10.0)].into_iter().collect());
        let training = TrainingSet::from(users);

        assert_eq!(popularity_ranking(&training), vec![10, 20, 30]);

        let mut held: HashMap<UserId, HashSet<ItemId>> = HashMap::new();
        held.insert(1, vec![10].into_iter().collect());
        held.insert(2, vec![20].into_iter().collect());
        let held_out = HeldOut::from(held);

        let mut labels: HashMap<ItemId, String> = HashMap::new();
        for &item_id in &[10, 20, 30] {
            labels.insert(item_id, format!("Item {}", item_id));
        }
        let catalog = Catalog::from(labels);

        let model = Hyperparameters::new(1).metric(Metric::DotProduct).build();
        let result = evaluate_all(&model, &training, &held_out, &catalog, 42).unwrap();

        // user 1 already knows the most popular item, so its baseline list
        // is [30] and misses; user 2's list is [20, 30] and hits
        assert!((result.precision_popularity - 0.1).abs() < 1e-6);
    }

    #[test]
    fn single_user_evaluation_reports_top_played_and_precision() {
        let (training, held_out, _) = fixture();
        let model = Hyperparameters::new(2).metric(Metric::DotProduct).build();

        let evaluation = evaluate_user(&model, &training, &held_out, 1).unwrap();

        assert_eq!(evaluation.top_played, vec![1, 2]);
        assert_eq!(evaluation.recommended, vec![3]);
        assert!((evaluation.precision - 0.1).abs() < 1e-6);
    }

    #[test]
    fn unknown_users_are_rejected() {
        let (training, held_out, _) = fixture();
        let model = Hyperparameters::new(2).build();

        match evaluate_user(&model, &training, &held_out, 99) {
            Err(EvaluationError::UnknownUser(99)) => {}
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn users_without_held_out_data_are_rejected() {
        let (training, _, _) = fixture();
        let held_out = HeldOut::from(HashMap::new());
        let model = Hyperparameters::new(2).build();

        match evaluate_user(&model, &training, &held_out, 1) {
            Err(EvaluationError::MissingHeldOut(1)) => {}
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn artist_queries_recommend_around_the_matching_items() {
        let mut users: HashMap<UserId, FeatureVector> = HashMap::new();
        users.insert(1, vec![(1, 5.0), (2, 3.0)].into_iter().collect());
        users.insert(2, vec![(1, 2.0), (3, 4.0), (4, 1.0)].into_iter().collect());
        let training = TrainingSet::from(users);

        let mut labels: HashMap<ItemId, String> = HashMap::new();
        labels.insert(1, "Bruno Mars - Grenade".to_string());
        labels.insert(2, "Adele - Hello".to_string());
        labels.insert(3, "Bruno Mars - The Lazy Song".to_string());
        labels.insert(4, "Eagles - Hotel California".to_string());
        let catalog = Catalog::from(labels);

        let model = Hyperparameters::new(2).metric(Metric::DotProduct).build();
        let recommended = evaluate_artist(&model, &training, &catalog, "bruno");

        // the pseudo-user holds items 1 and 3, so neither may be recommended
        assert_eq!(recommended, vec![2, 4]);
    }

    #[test]
    fn artist_queries_with_no_matches_stay_well_defined() {
        let mut users: HashMap<UserId, FeatureVector> = HashMap::new();
        users.insert(1, vec![(1, 5.0), (2, 3.0)].into_iter().collect());
        users.insert(2, vec![(1, 2.0), (3, 4.0), (4, 1.0)].into_iter().collect());
        let training = TrainingSet::from(users);

        let mut labels: HashMap<ItemId, String> = HashMap::new();
        for item_id in 1..5 {
            labels.insert(item_id, format!("Item {}", item_id));
        }
        let catalog = Catalog::from(labels);

        let model = Hyperparameters::new(2).metric(Metric::DotProduct).build();
        let recommended = evaluate_artist(&model, &training, &catalog, "zeppelin");

        assert_eq!(recommended, vec![1, 2, 3, 4]);
    }
}
