//! Cross-cutting helpers: object persistence and model evaluation

mod evaluate;
mod persist;

pub use evaluate::{Evaluation, EvaluationReport, SearchSettings, evaluate_models, evaluate_models_with};
pub use persist::{load_object, save_object};
