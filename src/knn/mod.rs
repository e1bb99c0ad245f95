//! K-nearest-neighbor classification over labeled 2D points.
//!
//! The classifier answers queries either by a brute-force scan of the
//! training set or through the k-d tree in [`kd_tree`]; both use the
//! Manhattan metric, so the two strategies agree on every query.

pub mod heap_utils;
pub mod kd_tree;

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::hash::Hash;

use num_traits::{AsPrimitive, Float};

use self::kd_tree::KdTree;
use crate::common_types::{LabeledPoint, Point2, manhattan_distance};

/// Defines the search strategy used to answer neighbor queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    BruteForce,
    KdTree,
}

/// Classification failed because there were no neighbors to vote over: the
/// classifier is unfitted, the training set is empty, or `k` is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionError {
    EmptyNeighborSet,
}

impl fmt::Display for PredictionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionError::EmptyNeighborSet => {
                write!(f, "no neighbors available for majority vote (empty training set or k = 0)")
            }
        }
    }
}

impl Error for PredictionError {}

/// The K-Nearest Neighbors classifier.
#[derive(Debug)]
pub struct KnnClassifier<F, L> {
    k: usize,
    training_data: Vec<LabeledPoint<F, L>>,
    kd_tree: Option<KdTree<F, L>>,
    search_strategy: SearchStrategy,
}

impl<F, L> KnnClassifier<F, L> {
    /// Below this training-set size a linear scan beats the tree.
    pub const N_THRESHOLD_FOR_BRUTE_FORCE: usize = 1000;
}

impl<F, L> KnnClassifier<F, L>
where
    F: Float + AsPrimitive<f64>,
    L: Clone + Eq + Hash + Ord,
{
    pub fn new(k: usize) -> Self {
        Self {
            k,
            training_data: Vec::new(),
            kd_tree: None,
            search_strategy: SearchStrategy::BruteForce, // Default before fit
        }
    }

    /// Trains the classifier.
    ///
    /// Stores the training data and chooses a search strategy: brute force
    /// when the number of points is below [`Self::N_THRESHOLD_FOR_BRUTE_FORCE`],
    /// otherwise the k-d tree. If `strategy_override` is `Some`, that
    /// strategy is used regardless of the heuristic. Any existing training
    /// data and search structure are replaced.
    pub fn fit(
        &mut self,
        training_data: Vec<LabeledPoint<F, L>>,
        strategy_override: Option<SearchStrategy>,
    ) {
        self.kd_tree = None;
        self.training_data = training_data;

        if self.training_data.is_empty() {
            self.search_strategy = SearchStrategy::BruteForce;
            return;
        }

        let chosen = strategy_override.unwrap_or_else(|| {
            if self.training_data.len() >= Self::N_THRESHOLD_FOR_BRUTE_FORCE {
                SearchStrategy::KdTree
            } else {
                SearchStrategy::BruteForce
            }
        });

        match chosen {
            SearchStrategy::BruteForce => {
                self.search_strategy = SearchStrategy::BruteForce;
            }
            SearchStrategy::KdTree => {
                let tree = KdTree::build(self.training_data.clone());
                if tree.is_empty() {
                    self.search_strategy = SearchStrategy::BruteForce;
                } else {
                    self.kd_tree = Some(tree);
                    self.search_strategy = SearchStrategy::KdTree;
                }
            }
        }
    }

    /// Returns the currently active search strategy.
    pub fn get_search_strategy(&self) -> SearchStrategy {
        self.search_strategy
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Up to `min(k, n)` nearest `(distance, point)` pairs for `query`, in
    /// ascending distance order. An unfitted classifier returns no
    /// neighbors.
    pub fn nearest_neighbors(&self, query: Point2<F>) -> Vec<(f64, LabeledPoint<F, L>)> {
        match (self.search_strategy, &self.kd_tree) {
            (SearchStrategy::KdTree, Some(tree)) => tree.nearest_neighbors(query, self.k),
            _ => self.nearest_neighbors_brute_force(query),
        }
    }

    /// Linear scan: distance to every training point, sort, keep the first k.
    fn nearest_neighbors_brute_force(&self, query: Point2<F>) -> Vec<(f64, LabeledPoint<F, L>)> {
        let mut distances: Vec<(f64, LabeledPoint<F, L>)> = self
            .training_data
            .iter()
            .map(|p| (manhattan_distance(query, p.point), p.clone()))
            .collect();
        distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        distances.truncate(self.k);
        distances
    }

    /// Predicts the label for a single query point.
    ///
    /// # Errors
    /// [`PredictionError::EmptyNeighborSet`] if no neighbors are available
    /// (unfitted classifier, empty training set, or `k` of 0).
    pub fn predict_single(&self, query: Point2<F>) -> Result<L, PredictionError> {
        let neighbors = self.nearest_neighbors(query);
        Self::majority_vote(&neighbors)
    }

    /// Predicts labels for a batch of query points.
    ///
    /// # Errors
    /// [`PredictionError::EmptyNeighborSet`] under the same conditions as
    /// [`Self::predict_single`].
    pub fn predict(&self, queries: &[Point2<F>]) -> Result<Vec<L>, PredictionError> {
        queries.iter().map(|q| self.predict_single(*q)).collect()
    }

    /// Majority vote over a neighbor set. Ties fall to the label whose
    /// neighbors sit closest in total, then to the smaller label, so the
    /// outcome never depends on map iteration order.
    fn majority_vote(neighbors: &[(f64, LabeledPoint<F, L>)]) -> Result<L, PredictionError> {
        let mut tallies: HashMap<&L, (usize, f64)> = HashMap::new();
        for (distance, neighbor) in neighbors {
            let entry = tallies.entry(&neighbor.label).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += *distance;
        }

        tallies
            .into_iter()
            .min_by(|(label_a, (count_a, dist_a)), (label_b, (count_b, dist_b))| {
                count_b
                    .cmp(count_a)
                    .then_with(|| dist_a.partial_cmp(dist_b).unwrap_or(std::cmp::Ordering::Equal))
                    .then_with(|| label_a.cmp(label_b))
            })
            .map(|(label, _)| label.clone())
            .ok_or(PredictionError::EmptyNeighborSet)
    }
}
