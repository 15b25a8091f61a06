//! Random forest classifier
//!
//! Seeded bootstrap ensemble of Gini trees. Trees are fit in parallel, each
//! from its own deterministic ChaCha8 stream derived from the base seed, so
//! a given (data, config) pair always produces the same forest.

use crate::error::{ExoError, Result};
use super::decision_tree::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub tree_count: usize,
    /// Maximum depth per tree; unbounded when `None`
    pub max_depth: Option<usize>,
    /// Base seed for bootstrap and feature sampling
    pub random_seed: u64,
    n_classes: usize,
    n_features: usize,
}

impl RandomForestClassifier {
    pub fn new(tree_count: usize) -> Self {
        Self {
            trees: Vec::new(),
            tree_count: tree_count.max(1),
            max_depth: None,
            random_seed: 42,
            n_classes: 0,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Fit the forest. `y` holds class indices encoded as f64; the number of
    /// classes is one past the largest index seen.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(ExoError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(ExoError::Training(
                "cannot fit a forest on an empty matrix".to_string(),
            ));
        }

        self.n_features = n_features;
        self.n_classes = y
            .iter()
            .map(|v| v.round() as usize)
            .max()
            .map(|m| m + 1)
            .unwrap_or(0);

        let features_per_tree = (n_features as f64).sqrt().ceil().max(1.0) as usize;
        let base_seed = self.random_seed;
        let max_depth = self.max_depth;

        let trees: Result<Vec<DecisionTree>> = (0..self.tree_count)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                // Bootstrap sample with replacement
                let sample_indices: Vec<usize> = (0..n_samples)
                    .map(|_| (rng.next_u64() as usize) % n_samples)
                    .collect();

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Array1<f64> =
                    Array1::from_vec(sample_indices.iter().map(|&i| y[i]).collect());

                // Random feature subspace per tree
                let mut feature_pool: Vec<usize> = (0..n_features).collect();
                feature_pool.shuffle(&mut rng);
                feature_pool.truncate(features_per_tree.min(n_features));

                let mut tree = DecisionTree::new().with_feature_subset(feature_pool);
                if let Some(d) = max_depth {
                    tree = tree.with_max_depth(d);
                }
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        Ok(self)
    }

    /// Majority-vote class index per row.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        let predictions: Vec<f64> = proba
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(idx, _)| idx as f64)
                    .unwrap_or(0.0)
            })
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    /// Per-class vote fractions; each row sums to 1.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(ExoError::ModelNotTrained);
        }
        if x.ncols() != self.n_features {
            return Err(ExoError::ShapeError {
                expected: format!("{} columns", self.n_features),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let n_samples = x.nrows();
        let mut proba = Array2::zeros((n_samples, self.n_classes));

        for preds in &all_predictions {
            for (i, &p) in preds.iter().enumerate() {
                let class = p.round() as usize;
                if class < self.n_classes {
                    proba[[i, class]] += 1.0;
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        proba.mapv_inplace(|v| v / n_trees);
        Ok(proba)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy_data() -> (Array2<f64>, Array1<f64>) {
        (
            array![
                [0.0, 0.0],
                [0.1, 0.1],
                [0.2, 0.2],
                [1.0, 1.0],
                [1.1, 1.1],
                [1.2, 1.2],
            ],
            array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        )
    }

    #[test]
    fn test_classifier_accuracy() {
        let (x, y) = toy_data();
        let mut rf = RandomForestClassifier::new(20).with_random_seed(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count() as f64
            / y.len() as f64;
        assert!(accuracy >= 0.8, "accuracy too low: {}", accuracy);
    }

    #[test]
    fn test_proba_rows_sum_to_one() {
        let (x, y) = toy_data();
        let mut rf = RandomForestClassifier::new(10).with_random_seed(42);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        for i in 0..proba.nrows() {
            let row_sum: f64 = proba.row(i).sum();
            assert!((row_sum - 1.0).abs() < 1e-6, "row {} sum: {}", i, row_sum);
        }
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let (x, y) = toy_data();

        let mut a = RandomForestClassifier::new(15).with_random_seed(7);
        a.fit(&x, &y).unwrap();
        let mut b = RandomForestClassifier::new(15).with_random_seed(7);
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_unfitted_predict_fails() {
        let rf = RandomForestClassifier::new(5);
        assert!(matches!(
            rf.predict(&array![[1.0]]).unwrap_err(),
            ExoError::ModelNotTrained
        ));
    }
}
