//! Standard (z-score) feature scaling
//!
//! Fit on the training partition only; both partitions and all later
//! inference rows are transformed with the training statistics.

use crate::error::{ExoError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column standardization: (x - mean) / std.
///
/// Uses the population standard deviation. Zero-variance columns scale by 1
/// so constant features pass through centered instead of producing NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            means: Vec::new(),
            stds: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit the scaler to a feature matrix.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(ExoError::ShapeError {
                expected: "at least one row".to_string(),
                actual: "0 rows".to_string(),
            });
        }

        let n = x.nrows() as f64;
        self.means.clear();
        self.stds.clear();

        for col in x.axis_iter(Axis(1)) {
            let mean = col.sum() / n;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            self.means.push(mean);
            self.stds.push(if std == 0.0 { 1.0 } else { std });
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform a matrix with the fitted statistics.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ExoError::ModelNotTrained);
        }
        if x.ncols() != self.means.len() {
            return Err(ExoError::ShapeError {
                expected: format!("{} columns", self.means.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        Ok(Array2::from_shape_fn(x.dim(), |(r, c)| {
            (x[[r, c]] - self.means[c]) / self.stds[c]
        }))
    }

    /// Fit and transform in one step.
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0], [5.0, 50.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        for c in 0..2 {
            let col = scaled.column(c);
            let mean: f64 = col.sum() / col.len() as f64;
            let var: f64 = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / col.len() as f64;
            assert!(mean.abs() < 1e-10);
            assert!((var - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_constant_column_does_not_nan() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();
        assert!(scaled.iter().all(|v| v.is_finite()));
        assert_eq!(scaled[[0, 1]], 0.0);
    }

    #[test]
    fn test_transform_uses_training_stats() {
        let train = array![[0.0], [2.0]];
        let test = array![[1.0]];

        let mut scaler = StandardScaler::new();
        scaler.fit(&train).unwrap();
        let scaled = scaler.transform(&test).unwrap();
        // train mean 1.0, std 1.0
        assert!((scaled[[0, 0]] - 0.0).abs() < 1e-10);
    }

    #[test]
    fn test_width_mismatch() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0]]).unwrap();
        let err = scaler.transform(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, ExoError::ShapeError { .. }));
    }

    #[test]
    fn test_unfitted_transform_fails() {
        let scaler = StandardScaler::new();
        assert!(scaler.transform(&array![[1.0]]).is_err());
    }
}
