use std::path::PathBuf;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::ingestion::DataIngestion;
use crate::trainer::{ModelRegistry, ModelTrainer, TrainingOutcome};
use crate::transformation::DataTransformation;

/// Artifacts and score of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub preprocessor_path: PathBuf,
    pub training: TrainingOutcome,
}

impl PipelineOutcome {
    pub fn r2_score(&self) -> f64 {
        self.training.r2_score
    }
}

/// Ingestion → transformation → training, driven by one [`PipelineConfig`].
pub struct TrainingPipeline {
    config: PipelineConfig,
    registry: Option<ModelRegistry>,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config, registry: None }
    }

    /// Search these candidates instead of the default set.
    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<PipelineOutcome> {
        let (train_path, test_path) = DataIngestion::new(&self.config).initiate_data_ingestion()?;

        let (train_arr, test_arr, preprocessor_path) = DataTransformation::new(&self.config)
            .initiate_data_transformation(&train_path, &test_path)?;

        let mut trainer = ModelTrainer::new(&self.config);
        if let Some(registry) = &self.registry {
            trainer = trainer.with_registry(registry.clone());
        }
        let training = trainer.initiate_model_trainer(&train_arr, &test_arr)?;

        Ok(PipelineOutcome {
            train_path,
            test_path,
            preprocessor_path,
            training,
        })
    }
}

/// Run the whole pipeline with the default candidate models.
pub fn run(config: PipelineConfig) -> Result<PipelineOutcome> {
    TrainingPipeline::new(config).run()
}
