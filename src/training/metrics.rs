//! Held-out evaluation metrics
//!
//! Produces the same shape the service has always reported: accuracy, a
//! confusion matrix in sorted-label order (rows = true, columns = predicted),
//! and a per-class classification report with macro and weighted averages.

use serde::{Deserialize, Serialize};
use ndarray::Array1;
use std::collections::BTreeMap;

/// Precision/recall/f1/support for one class or one aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassReport {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class report plus the two standard aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    #[serde(flatten)]
    pub per_class: BTreeMap<String, ClassReport>,
    #[serde(rename = "macro avg")]
    pub macro_avg: ClassReport,
    #[serde(rename = "weighted avg")]
    pub weighted_avg: ClassReport,
}

/// Full evaluation of one training run on the held-out partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub accuracy: f64,
    /// Rows = true label, columns = predicted label, sorted label order
    pub confusion_matrix: Vec<Vec<usize>>,
    pub report: ClassificationReport,
}

/// Evaluate predictions against truth. `labels` maps class indices to names
/// and fixes the matrix ordering; both target vectors hold class indices.
pub fn evaluate(y_true: &Array1<f64>, y_pred: &Array1<f64>, labels: &[String]) -> Evaluation {
    let n_classes = labels.len();
    let n = y_true.len();

    let mut confusion = vec![vec![0usize; n_classes]; n_classes];
    let mut correct = 0usize;

    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        let ti = t.round() as usize;
        let pi = p.round() as usize;
        if ti < n_classes && pi < n_classes {
            confusion[ti][pi] += 1;
        }
        if ti == pi {
            correct += 1;
        }
    }

    let accuracy = if n > 0 { correct as f64 / n as f64 } else { 0.0 };

    let mut per_class = BTreeMap::new();
    let mut macro_sum = (0.0, 0.0, 0.0);
    let mut weighted_sum = (0.0, 0.0, 0.0);
    let total_support: usize = confusion.iter().map(|row| row.iter().sum::<usize>()).sum();

    for (i, label) in labels.iter().enumerate() {
        let tp = confusion[i][i];
        let support: usize = confusion[i].iter().sum();
        let predicted: usize = confusion.iter().map(|row| row[i]).sum();

        let precision = if predicted > 0 {
            tp as f64 / predicted as f64
        } else {
            0.0
        };
        let recall = if support > 0 {
            tp as f64 / support as f64
        } else {
            0.0
        };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        macro_sum.0 += precision;
        macro_sum.1 += recall;
        macro_sum.2 += f1_score;

        let weight = support as f64;
        weighted_sum.0 += precision * weight;
        weighted_sum.1 += recall * weight;
        weighted_sum.2 += f1_score * weight;

        per_class.insert(
            label.clone(),
            ClassReport {
                precision,
                recall,
                f1_score,
                support,
            },
        );
    }

    let k = n_classes.max(1) as f64;
    let macro_avg = ClassReport {
        precision: macro_sum.0 / k,
        recall: macro_sum.1 / k,
        f1_score: macro_sum.2 / k,
        support: total_support,
    };

    let w = total_support.max(1) as f64;
    let weighted_avg = ClassReport {
        precision: weighted_sum.0 / w,
        recall: weighted_sum.1 / w,
        f1_score: weighted_sum.2 / w,
        support: total_support,
    };

    Evaluation {
        accuracy,
        confusion_matrix: confusion,
        report: ClassificationReport {
            per_class,
            macro_avg,
            weighted_avg,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels() -> Vec<String> {
        vec!["CONFIRMED".to_string(), "FALSE POSITIVE".to_string()]
    }

    #[test]
    fn test_perfect_predictions() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let eval = evaluate(&y, &y, &labels());

        assert_eq!(eval.accuracy, 1.0);
        assert_eq!(eval.confusion_matrix, vec![vec![2, 0], vec![0, 2]]);
        let confirmed = &eval.report.per_class["CONFIRMED"];
        assert_eq!(confirmed.precision, 1.0);
        assert_eq!(confirmed.recall, 1.0);
        assert_eq!(confirmed.support, 2);
    }

    #[test]
    fn test_confusion_matrix_orientation() {
        // One CONFIRMED row predicted FALSE POSITIVE: row 0 (true), col 1 (pred)
        let y_true = array![0.0, 1.0];
        let y_pred = array![1.0, 1.0];
        let eval = evaluate(&y_true, &y_pred, &labels());

        assert_eq!(eval.confusion_matrix[0][1], 1);
        assert_eq!(eval.confusion_matrix[1][1], 1);
        assert_eq!(eval.accuracy, 0.5);
    }

    #[test]
    fn test_matrix_sums_to_sample_count() {
        let y_true = array![0.0, 0.0, 1.0, 1.0, 1.0];
        let y_pred = array![0.0, 1.0, 1.0, 0.0, 1.0];
        let eval = evaluate(&y_true, &y_pred, &labels());

        let total: usize = eval
            .confusion_matrix
            .iter()
            .map(|row| row.iter().sum::<usize>())
            .sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn test_weighted_average_uses_support() {
        // 3 of class 0, 1 of class 1, all predicted class 0
        let y_true = array![0.0, 0.0, 0.0, 1.0];
        let y_pred = array![0.0, 0.0, 0.0, 0.0];
        let eval = evaluate(&y_true, &y_pred, &labels());

        // class 0: precision 0.75, recall 1.0; class 1: all zero
        assert!((eval.report.weighted_avg.recall - 0.75).abs() < 1e-9);
        assert!((eval.report.macro_avg.recall - 0.5).abs() < 1e-9);
        assert_eq!(eval.report.weighted_avg.support, 4);
    }
}
