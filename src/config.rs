use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::split::SplitConfig;

/// Environment variable overriding the project root.
pub const ROOT_ENV: &str = "MLPROJECT_ROOT";

/// Optional override file looked up in the project root.
pub const CONFIG_FILE: &str = "mlproject.json";

// ---------------------------------------------------------------------------
// PipelineConfig – every knob of a training run
// ---------------------------------------------------------------------------

/// Top-level configuration. Relative paths resolve against `project_root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub project_root: PathBuf,
    /// Source dataset (`.csv`, `.json` or `.parquet`).
    pub source_data: PathBuf,
    pub artifacts_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Column predicted by the regressors.
    pub target_column: String,
    pub test_size: f64,
    pub random_state: u64,
    /// Folds used by grid search cross-validation.
    pub cv_folds: usize,
    /// Grid search workers; `None` uses every available core.
    pub n_jobs: Option<usize>,
    /// Best test R² below this aborts training.
    pub min_model_score: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            source_data: PathBuf::from("notebook/data/stud.csv"),
            artifacts_dir: PathBuf::from("artifacts"),
            logs_dir: PathBuf::from("logs"),
            target_column: "math_score".to_string(),
            test_size: 0.2,
            random_state: 42,
            cv_folds: 3,
            n_jobs: None,
            min_model_score: 0.6,
        }
    }
}

impl PipelineConfig {
    /// Default configuration rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: root.into(),
            ..Self::default()
        }
    }

    /// Resolve the project root (`$MLPROJECT_ROOT` or the working directory)
    /// and apply `mlproject.json` from it when present.
    pub fn discover() -> Result<Self> {
        let root = match std::env::var_os(ROOT_ENV) {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir().context("resolving working directory")?,
        };
        Self::load(&root)
    }

    /// Load the configuration for a project rooted at `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let file = root.join(CONFIG_FILE);
        let mut config = if file.is_file() {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            serde_json::from_str::<PipelineConfig>(&text)
                .with_context(|| format!("parsing {}", file.display()))?
        } else {
            PipelineConfig::default()
        };
        config.project_root = root.to_path_buf();
        Ok(config)
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    pub fn source_path(&self) -> PathBuf {
        self.resolve(&self.source_data)
    }

    pub fn artifacts_path(&self) -> PathBuf {
        self.resolve(&self.artifacts_dir)
    }

    pub fn logs_path(&self) -> PathBuf {
        self.resolve(&self.logs_dir)
    }

    pub fn split(&self) -> SplitConfig {
        SplitConfig {
            test_size: self.test_size,
            random_state: self.random_state,
        }
    }
}
