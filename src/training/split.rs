//! Seeded stratified train/test split

use crate::error::{ExoError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// A train/test partition of the feature matrix and target.
#[derive(Debug)]
pub struct SplitData {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

/// Stratified holdout split preserving per-class proportions.
///
/// Samples are grouped by class, shuffled with the seed, and the rounded
/// `test_ratio` tail of each class becomes the holdout. Fails when any class
/// has fewer than 2 members or when either partition ends up empty.
pub fn stratified_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_ratio: f64,
    seed: u64,
) -> Result<SplitData> {
    if x.nrows() != y.len() {
        return Err(ExoError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }

    // BTreeMap keeps class iteration order stable across runs
    let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, &val) in y.iter().enumerate() {
        class_indices.entry(val.round() as i64).or_default().push(idx);
    }

    for (class, indices) in &class_indices {
        if indices.len() < 2 {
            return Err(ExoError::InsufficientData(format!(
                "class {} has {} member(s); stratified split needs at least 2 per class",
                class,
                indices.len()
            )));
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_indices: Vec<usize> = Vec::new();
    let mut test_indices: Vec<usize> = Vec::new();

    for indices in class_indices.values() {
        let mut indices = indices.clone();
        indices.shuffle(&mut rng);

        // Every class keeps at least one row on each side of the split
        let class_test_size = ((indices.len() as f64 * test_ratio).round() as usize)
            .clamp(1, indices.len() - 1);
        let split_point = indices.len() - class_test_size;
        train_indices.extend_from_slice(&indices[..split_point]);
        test_indices.extend_from_slice(&indices[split_point..]);
    }

    if train_indices.is_empty() || test_indices.is_empty() {
        return Err(ExoError::InsufficientData(
            "stratified split produced an empty train or test partition".to_string(),
        ));
    }

    Ok(SplitData {
        x_train: x.select(Axis(0), &train_indices),
        x_test: x.select(Axis(0), &test_indices),
        y_train: Array1::from_vec(train_indices.iter().map(|&i| y[i]).collect()),
        y_test: Array1::from_vec(test_indices.iter().map(|&i| y[i]).collect()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn balanced_data(per_class: usize) -> (Array2<f64>, Array1<f64>) {
        let n = per_class * 2;
        let x = Array2::from_shape_fn((n, 3), |(r, c)| (r * 3 + c) as f64);
        let y = Array1::from_shape_fn(n, |i| if i < per_class { 0.0 } else { 1.0 });
        (x, y)
    }

    #[test]
    fn test_preserves_class_proportions() {
        let (x, y) = balanced_data(10);
        let split = stratified_split(&x, &y, 0.2, 42).unwrap();

        let test_zeros = split.y_test.iter().filter(|&&v| v == 0.0).count();
        let test_ones = split.y_test.iter().filter(|&&v| v == 1.0).count();
        assert_eq!(test_zeros, 2);
        assert_eq!(test_ones, 2);
        assert_eq!(split.x_train.nrows(), 16);
        assert_eq!(split.x_test.nrows(), 4);
    }

    #[test]
    fn test_three_per_class_holds_out_one_each() {
        let (x, y) = balanced_data(3);
        let split = stratified_split(&x, &y, 0.2, 42).unwrap();
        // round(3 * 0.2) = 1 per class
        assert_eq!(split.y_test.len(), 2);
        assert_eq!(split.y_train.len(), 4);
    }

    #[test]
    fn test_single_member_class_rejected() {
        let x = Array2::zeros((3, 2));
        let y = Array1::from_vec(vec![0.0, 0.0, 1.0]);
        let err = stratified_split(&x, &y, 0.2, 42).unwrap_err();
        assert!(matches!(err, ExoError::InsufficientData(_)));
    }

    #[test]
    fn test_deterministic_for_seed() {
        let (x, y) = balanced_data(8);
        let a = stratified_split(&x, &y, 0.2, 9).unwrap();
        let b = stratified_split(&x, &y, 0.2, 9).unwrap();
        assert_eq!(a.x_test, b.x_test);
        assert_eq!(a.y_train, b.y_train);
    }

    #[test]
    fn test_rows_stay_paired_with_targets() {
        let (x, y) = balanced_data(5);
        let split = stratified_split(&x, &y, 0.2, 3).unwrap();
        // Every row encodes its original index; its class must match y
        for (row, &label) in split.x_train.axis_iter(ndarray::Axis(0)).zip(split.y_train.iter()) {
            let original = (row[0] / 3.0) as usize;
            let expected = if original < 5 { 0.0 } else { 1.0 };
            assert_eq!(label, expected);
        }
    }
}
