//! Training configuration and its guarded store
//!
//! The configuration is the only piece of state mutated by administrative
//! calls besides the model slot itself. A single mutex covers both reads and
//! writes so an update is always observed whole: a training run snapshots the
//! configuration once and releases the lock before the expensive fit starts.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Hyperparameters and data locations for one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the KOI dataset CSV
    pub dataset_path: PathBuf,
    /// Number of trees in the forest
    pub tree_count: usize,
    /// Maximum tree depth; `None` or `Some(0)` means unbounded
    pub max_depth: Option<usize>,
    /// Seed for the split and the forest
    pub random_seed: u64,
    /// Directory where uploaded CSVs are stored
    pub upload_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            dataset_path: std::env::var("DATASET_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| cwd.join("kepler.csv")),
            tree_count: 100,
            max_depth: Some(100),
            random_seed: 42,
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| cwd.join("uploaded_csvs")),
        }
    }
}

impl AppConfig {
    /// Effective depth bound: both absent and zero mean unbounded.
    pub fn effective_max_depth(&self) -> Option<usize> {
        match self.max_depth {
            None | Some(0) => None,
            other => other,
        }
    }
}

/// Partial update applied by the administrative endpoints. Unrecognized
/// fields never reach this struct; absent fields leave the configuration
/// untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigPatch {
    pub tree_count: Option<usize>,
    pub max_depth: Option<usize>,
    pub random_seed: Option<u64>,
    pub dataset_path: Option<PathBuf>,
}

/// Mutex-guarded configuration owner.
pub struct ConfigStore {
    inner: Mutex<AppConfig>,
}

impl ConfigStore {
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Mutex::new(config),
        }
    }

    /// Copy of the current configuration, safe to use with no lock held.
    pub fn snapshot(&self) -> AppConfig {
        self.inner.lock().clone()
    }

    /// Apply a partial update atomically and return the effective config.
    pub fn update(&self, patch: &ConfigPatch) -> AppConfig {
        let mut cfg = self.inner.lock();
        if let Some(n) = patch.tree_count {
            cfg.tree_count = n.max(1);
        }
        if let Some(d) = patch.max_depth {
            cfg.max_depth = Some(d);
        }
        if let Some(s) = patch.random_seed {
            cfg.random_seed = s;
        }
        if let Some(ref p) = patch.dataset_path {
            cfg.dataset_path = p.clone();
        }
        cfg.clone()
    }

    /// Point the store at a different dataset file.
    pub fn set_dataset_path(&self, path: PathBuf) -> AppConfig {
        let mut cfg = self.inner.lock();
        cfg.dataset_path = path;
        cfg.clone()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.tree_count, 100);
        assert_eq!(cfg.random_seed, 42);
        assert_eq!(cfg.max_depth, Some(100));
    }

    #[test]
    fn test_effective_max_depth() {
        let mut cfg = AppConfig::default();
        cfg.max_depth = Some(0);
        assert_eq!(cfg.effective_max_depth(), None);
        cfg.max_depth = None;
        assert_eq!(cfg.effective_max_depth(), None);
        cfg.max_depth = Some(7);
        assert_eq!(cfg.effective_max_depth(), Some(7));
    }

    #[test]
    fn test_partial_update_leaves_other_fields() {
        let store = ConfigStore::default();
        let before = store.snapshot();

        let patch = ConfigPatch {
            tree_count: Some(10),
            ..Default::default()
        };
        let after = store.update(&patch);

        assert_eq!(after.tree_count, 10);
        assert_eq!(after.random_seed, before.random_seed);
        assert_eq!(after.dataset_path, before.dataset_path);
    }

    #[test]
    fn test_update_returns_effective_config() {
        let store = ConfigStore::default();
        let patch = ConfigPatch {
            tree_count: Some(25),
            random_seed: Some(7),
            ..Default::default()
        };
        let cfg = store.update(&patch);
        assert_eq!(cfg.tree_count, 25);
        assert_eq!(cfg.random_seed, 7);
        assert_eq!(store.snapshot().tree_count, 25);
    }

    #[test]
    fn test_zero_tree_count_clamped() {
        let store = ConfigStore::default();
        let patch = ConfigPatch {
            tree_count: Some(0),
            ..Default::default()
        };
        assert_eq!(store.update(&patch).tree_count, 1);
    }
}
