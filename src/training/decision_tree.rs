//! Gini decision tree, the forest member
//!
//! Classification-only CART. Splits are midpoints between consecutive sorted
//! feature values, chosen by Gini gain. When built inside a forest each tree
//! scans only its assigned feature subset at every split.

use crate::error::{ExoError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        class: usize,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth; unbounded when `None`
    pub max_depth: Option<usize>,
    /// Minimum samples to attempt a split
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Features considered at each split; all when `None`
    pub feature_subset: Option<Vec<usize>>,
    n_features: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            feature_subset: None,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_feature_subset(mut self, subset: Vec<usize>) -> Self {
        self.feature_subset = Some(subset);
        self
    }

    /// Fit the tree. `y` holds class indices encoded as f64.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(ExoError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ExoError::Training("cannot fit a tree on zero samples".to_string()));
        }

        self.n_features = x.ncols();
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_node(x, y, &indices, 0));
        Ok(self)
    }

    fn build_node(&self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize], depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let class_counts = count_classes(y, indices);

        let should_stop = n_samples < self.min_samples_split
            || self.max_depth.map_or(false, |d| depth >= d)
            || class_counts.len() <= 1;

        if should_stop {
            return TreeNode::Leaf {
                class: majority_class(&class_counts),
                n_samples,
            };
        }

        let Some((feature_idx, threshold)) = self.find_best_split(x, y, indices) else {
            return TreeNode::Leaf {
                class: majority_class(&class_counts),
                n_samples,
            };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        if left_indices.len() < self.min_samples_leaf || right_indices.len() < self.min_samples_leaf {
            return TreeNode::Leaf {
                class: majority_class(&class_counts),
                n_samples,
            };
        }

        let left = Box::new(self.build_node(x, y, &left_indices, depth + 1));
        let right = Box::new(self.build_node(x, y, &right_indices, depth + 1));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
        }
    }

    fn candidate_features(&self) -> Vec<usize> {
        match &self.feature_subset {
            Some(subset) => subset.clone(),
            None => (0..self.n_features).collect(),
        }
    }

    fn find_best_split(&self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Option<(usize, f64)> {
        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let parent_impurity = gini(&count_classes_slice(&y_subset), indices.len());

        let mut best: Option<(usize, f64, f64)> = None;

        for feature_idx in self.candidate_features() {
            let mut values: Vec<f64> = indices.iter().map(|&i| x[[i, feature_idx]]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();

            for window in values.windows(2) {
                let threshold = (window[0] + window[1]) / 2.0;

                let mut left_counts: HashMap<i64, usize> = HashMap::new();
                let mut right_counts: HashMap<i64, usize> = HashMap::new();
                let mut left_n = 0usize;
                let mut right_n = 0usize;

                for &idx in indices {
                    let class = y[idx].round() as i64;
                    if x[[idx, feature_idx]] <= threshold {
                        *left_counts.entry(class).or_insert(0) += 1;
                        left_n += 1;
                    } else {
                        *right_counts.entry(class).or_insert(0) += 1;
                        right_n += 1;
                    }
                }

                if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                    continue;
                }

                let n = indices.len() as f64;
                let weighted = (left_n as f64 * gini(&left_counts, left_n)
                    + right_n as f64 * gini(&right_counts, right_n))
                    / n;
                let gain = parent_impurity - weighted;

                if gain > 0.0 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature_idx, threshold, gain));
                }
            }
        }

        best.map(|(f, t, _)| (f, t))
    }

    /// Predicted class index for every row.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(ExoError::ModelNotTrained)?;

        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let row = x.row(i).to_vec();
                Self::predict_row(root, &row) as f64
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    fn predict_row(node: &TreeNode, row: &[f64]) -> usize {
        match node {
            TreeNode::Leaf { class, .. } => *class,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if row[*feature_idx] <= *threshold {
                    Self::predict_row(left, row)
                } else {
                    Self::predict_row(right, row)
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }
}

fn count_classes(y: &Array1<f64>, indices: &[usize]) -> HashMap<i64, usize> {
    let mut counts = HashMap::new();
    for &i in indices {
        *counts.entry(y[i].round() as i64).or_insert(0) += 1;
    }
    counts
}

fn count_classes_slice(y: &[f64]) -> HashMap<i64, usize> {
    let mut counts = HashMap::new();
    for &v in y {
        *counts.entry(v.round() as i64).or_insert(0) += 1;
    }
    counts
}

fn majority_class(counts: &HashMap<i64, usize>) -> usize {
    counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(&class, _)| class.max(0) as usize)
        .unwrap_or(0)
}

fn gini(counts: &HashMap<i64, usize>, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.values().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_separable_classes() {
        let x = array![[0.0, 0.0], [0.1, 0.2], [0.9, 1.0], [1.0, 1.1]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        for (p, a) in predictions.iter().zip(y.iter()) {
            assert_eq!(*p, *a);
        }
    }

    #[test]
    fn test_max_depth_bound() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 3); // root at depth 0, leaves at <= 2
    }

    #[test]
    fn test_feature_subset_respected() {
        // Feature 0 separates perfectly, feature 1 is noise; restricting the
        // tree to feature 1 must not touch feature 0.
        let x = array![[0.0, 5.0], [0.0, 5.0], [1.0, 5.0], [1.0, 5.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new().with_feature_subset(vec![1]);
        tree.fit(&x, &y).unwrap();
        // Only a constant feature available: tree degenerates to a leaf
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_unfitted_predict_fails() {
        let tree = DecisionTree::new();
        assert!(tree.predict(&array![[1.0]]).is_err());
    }
}
