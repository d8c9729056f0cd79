use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::PipelineConfig;
use crate::data::loader::{load_file, write_csv};
use crate::data::split::{SplitConfig, split_dataset};
use crate::error::{Result, WrapErr};

/// Where ingestion writes its three CSV artifacts.
#[derive(Debug, Clone)]
pub struct DataIngestionConfig {
    pub train_data_path: PathBuf,
    pub test_data_path: PathBuf,
    pub raw_data_path: PathBuf,
}

impl DataIngestionConfig {
    pub fn new(artifacts_dir: &Path) -> Self {
        Self {
            train_data_path: artifacts_dir.join("train.csv"),
            test_data_path: artifacts_dir.join("test.csv"),
            raw_data_path: artifacts_dir.join("raw.csv"),
        }
    }
}

/// First pipeline stage: source dataset → raw/train/test CSVs.
pub struct DataIngestion {
    pub ingestion_config: DataIngestionConfig,
    source_path: PathBuf,
    artifacts_dir: PathBuf,
    split: SplitConfig,
}

impl DataIngestion {
    pub fn new(config: &PipelineConfig) -> Self {
        let artifacts_dir = config.artifacts_path();
        Self {
            ingestion_config: DataIngestionConfig::new(&artifacts_dir),
            source_path: config.source_path(),
            artifacts_dir,
            split: config.split(),
        }
    }

    /// Read the source dataset, write `raw.csv`, split it and write
    /// `train.csv` / `test.csv`.  Returns `(train_path, test_path)`.
    pub fn initiate_data_ingestion(&self) -> Result<(PathBuf, PathBuf)> {
        log::info!("entered the data ingestion component");
        self.ingest().wrap_err()?;
        log::info!("data ingestion completed");

        Ok((
            self.ingestion_config.train_data_path.clone(),
            self.ingestion_config.test_data_path.clone(),
        ))
    }

    fn ingest(&self) -> anyhow::Result<()> {
        let dataset = load_file(&self.source_path)?;
        log::info!("read dataset with {} rows from {}", dataset.len(), self.source_path.display());

        std::fs::create_dir_all(&self.artifacts_dir)
            .with_context(|| format!("creating {}", self.artifacts_dir.display()))?;

        let cfg = &self.ingestion_config;
        write_csv(&dataset, &cfg.raw_data_path)?;
        log::info!("raw data saved to {}", cfg.raw_data_path.display());

        log::info!("train test split initiated");
        let (train, test) = split_dataset(&dataset, &self.split)?;
        write_csv(&train, &cfg.train_data_path)?;
        write_csv(&test, &cfg.test_data_path)?;
        log::info!(
            "wrote {} train rows to {} and {} test rows to {}",
            train.len(),
            cfg.train_data_path.display(),
            test.len(),
            cfg.test_data_path.display()
        );
        Ok(())
    }
}
