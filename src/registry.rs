//! Model generation bundle and the single-slot registry
//!
//! A generation is immutable once published: classifier, scaler, feature
//! order, the filtered dataset it was trained from, and its evaluation all
//! travel together so a reader can never mix an old classifier with a new
//! dataset. The registry owns exactly one current generation plus the report
//! of the most recent training attempt, successful or not.

use crate::config::AppConfig;
use crate::preprocessing::StandardScaler;
use crate::training::forest::RandomForestClassifier;
use crate::training::metrics::Evaluation;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One internally consistent trained model.
#[derive(Debug, Clone)]
pub struct ModelGeneration {
    pub forest: RandomForestClassifier,
    pub scaler: StandardScaler,
    /// Ordered feature columns; inference reindexes to exactly this order
    pub feature_columns: Vec<String>,
    /// Imputation means aligned with `feature_columns`
    pub impute_means: Vec<f64>,
    /// Sorted class labels; class index i predicts `labels[i]`
    pub labels: Vec<String>,
    /// The filtered (pre-split) table this generation was trained from
    pub dataset: DataFrame,
    pub summary: ModelSummary,
}

/// Serializable description of a successful training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub accuracy: f64,
    pub confusion_matrix: Vec<Vec<usize>>,
    pub classification_report: crate::training::metrics::ClassificationReport,
    pub n_features: usize,
    pub n_samples: usize,
    pub config: AppConfig,
}

/// Outcome of the most recent training attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ModelSummary>,
    pub completed_at: DateTime<Utc>,
}

impl TrainingReport {
    pub fn success(summary: ModelSummary) -> Self {
        Self {
            success: true,
            error: None,
            metrics: Some(summary),
            completed_at: Utc::now(),
        }
    }

    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            metrics: None,
            completed_at: Utc::now(),
        }
    }
}

/// The registry's single slot: generation and report move together so a
/// reader can never pair a new generation with the previous run's report.
#[derive(Default)]
struct RegistrySlot {
    current: Option<Arc<ModelGeneration>>,
    report: Option<TrainingReport>,
}

/// Single-slot model registry. No versioning and no rollback: publishing
/// replaces the slot, failures leave it alone.
pub struct ModelRegistry {
    slot: RwLock<RegistrySlot>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(RegistrySlot::default()),
        }
    }

    /// Atomically replace the current generation and record its report.
    pub fn publish(&self, generation: ModelGeneration) {
        let report = TrainingReport::success(generation.summary.clone());
        let generation = Arc::new(generation);
        let mut slot = self.slot.write();
        slot.current = Some(generation);
        slot.report = Some(report);
    }

    /// Record a failed attempt without touching the current generation.
    pub fn record_failure(&self, error: String) {
        self.slot.write().report = Some(TrainingReport::failure(error));
    }

    /// The live generation, if any training run has ever succeeded.
    pub fn current(&self) -> Option<Arc<ModelGeneration>> {
        self.slot.read().current.clone()
    }

    pub fn is_trained(&self) -> bool {
        self.slot.read().current.is_some()
    }

    /// Report of the most recent attempt, success or failure.
    pub fn report(&self) -> Option<TrainingReport> {
        self.slot.read().report.clone()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = ModelRegistry::new();
        assert!(registry.current().is_none());
        assert!(!registry.is_trained());
        assert!(registry.report().is_none());
    }

    #[test]
    fn test_failure_keeps_slot_empty() {
        let registry = ModelRegistry::new();
        registry.record_failure("CSV file not found".to_string());

        assert!(registry.current().is_none());
        let report = registry.report().unwrap();
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("CSV file not found"));
    }

    #[test]
    fn test_failure_report_replaces_previous() {
        let registry = ModelRegistry::new();
        registry.record_failure("first".to_string());
        registry.record_failure("second".to_string());
        assert_eq!(registry.report().unwrap().error.as_deref(), Some("second"));
    }

    #[test]
    fn test_publish_pairs_generation_with_report() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "kepid,kepoi_name,koi_disposition,koi_period,koi_depth").unwrap();
        writeln!(file, "1,K00001.01,CONFIRMED,2.47,142.9").unwrap();
        writeln!(file, "2,K00002.01,CONFIRMED,2.20,160.1").unwrap();
        writeln!(file, "3,K00003.01,CONFIRMED,4.88,180.0").unwrap();
        writeln!(file, "4,K00004.01,FALSE POSITIVE,1.76,9000.0").unwrap();
        writeln!(file, "5,K00005.01,FALSE POSITIVE,1.20,8700.0").unwrap();
        writeln!(file, "6,K00006.01,FALSE POSITIVE,0.90,9100.0").unwrap();

        let config = |seed: u64| AppConfig {
            dataset_path: file.path().to_path_buf(),
            tree_count: 5,
            max_depth: Some(0),
            random_seed: seed,
            upload_dir: std::env::temp_dir(),
        };

        let registry = ModelRegistry::new();
        registry.publish(crate::training::train(&config(42)).unwrap());
        registry.record_failure("stale".to_string());
        registry.publish(crate::training::train(&config(7)).unwrap());

        // One read of the slot sees the generation and its own report
        let generation = registry.current().unwrap();
        let report = registry.report().unwrap();
        assert!(report.success);
        assert_eq!(generation.summary.config.random_seed, 7);
        assert_eq!(report.metrics.unwrap().config.random_seed, 7);
    }
}
