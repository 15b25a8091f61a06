//! Model training pipeline
//!
//! One training run: load and filter the configured dataset, derive the
//! numeric feature matrix, stratified 80/20 split, scale with training
//! statistics, fit the forest, evaluate on the holdout, and package the lot
//! into an immutable [`ModelGeneration`](crate::registry::ModelGeneration).

pub mod decision_tree;
pub mod forest;
pub mod metrics;
pub mod split;

pub use forest::RandomForestClassifier;
pub use metrics::{evaluate, ClassificationReport, ClassReport, Evaluation};
pub use split::{stratified_split, SplitData};

use crate::config::AppConfig;
use crate::dataset;
use crate::error::Result;
use crate::preprocessing::StandardScaler;
use crate::registry::{ModelGeneration, ModelRegistry, ModelSummary, TrainingReport};
use tracing::{error, info};

/// Held-out fraction of each class
const TEST_RATIO: f64 = 0.2;

/// Run one full training pass against a configuration snapshot.
///
/// Any failure leaves the caller's current generation untouched; nothing here
/// mutates shared state.
pub fn train(config: &AppConfig) -> Result<ModelGeneration> {
    let df = dataset::load_and_filter(&config.dataset_path)?;
    let features = dataset::derive_features(&df)?;

    let split = stratified_split(&features.x, &features.y, TEST_RATIO, config.random_seed)?;

    let mut scaler = StandardScaler::new();
    let x_train = scaler.fit_transform(&split.x_train)?;
    let x_test = scaler.transform(&split.x_test)?;

    let mut forest = RandomForestClassifier::new(config.tree_count)
        .with_max_depth(config.effective_max_depth())
        .with_random_seed(config.random_seed);
    forest.fit(&x_train, &split.y_train)?;

    let y_pred = forest.predict(&x_test)?;
    let evaluation = evaluate(&split.y_test, &y_pred, &features.labels);

    let summary = ModelSummary {
        accuracy: evaluation.accuracy,
        confusion_matrix: evaluation.confusion_matrix.clone(),
        classification_report: evaluation.report.clone(),
        n_features: features.columns.len(),
        n_samples: df.height(),
        config: config.clone(),
    };

    info!(
        accuracy = summary.accuracy,
        n_samples = summary.n_samples,
        n_features = summary.n_features,
        trees = config.tree_count,
        "Training run completed"
    );

    Ok(ModelGeneration {
        forest,
        scaler,
        feature_columns: features.columns,
        impute_means: features.impute_means,
        labels: features.labels,
        dataset: df,
        summary,
    })
}

/// Train against a snapshot and publish on success; failures are recorded in
/// the registry's report and never propagate.
pub fn train_and_publish(config: &AppConfig, registry: &ModelRegistry) -> TrainingReport {
    match train(config) {
        Ok(generation) => {
            registry.publish(generation);
            registry
                .report()
                .unwrap_or_else(|| TrainingReport::failure("report missing after publish".to_string()))
        }
        Err(e) => {
            error!(error = %e, path = %config.dataset_path.display(), "Training run failed");
            registry.record_failure(e.to_string());
            registry
                .report()
                .unwrap_or_else(|| TrainingReport::failure(e.to_string()))
        }
    }
}
