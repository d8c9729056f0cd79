//! Tabular regression training pipeline
//!
//! ```text
//! source file ──► ingestion ──► raw / train / test CSV
//!                                     │
//!                               transformation ──► preprocessor.json
//!                                     │
//!                                  trainer ──► model.json + test R²
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod metrics;
pub mod model_selection;
pub mod models;
pub mod pipeline;
pub mod trainer;
pub mod transformation;
pub mod utils;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{PipelineOutcome, TrainingPipeline};
