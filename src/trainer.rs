use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use ndarray::{Array1, Array2, s};

use crate::config::PipelineConfig;
use crate::error::{Result, WrapErr};
use crate::metrics::{mean_absolute_error, r2_score};
use crate::model_selection::Parallelism;
use crate::models::{
    DecisionTreeRegressor, Estimator, GradientBoostingRegressor, KNeighborsRegressor,
    LinearRegression, ParamGrid, ParamValue, RandomForestRegressor, Regressor, RidgeRegression,
};
use crate::utils::{Evaluation, EvaluationReport, SearchSettings, evaluate_models_with, save_object};

// ---------------------------------------------------------------------------
// ModelRegistry – candidate models and their search spaces
// ---------------------------------------------------------------------------

/// Named untrained estimators paired with their parameter grids.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    pub models: BTreeMap<String, Estimator>,
    pub params: BTreeMap<String, ParamGrid>,
}

fn grid<const N: usize>(entries: [(&str, Vec<ParamValue>); N]) -> ParamGrid {
    entries
        .into_iter()
        .map(|(name, values)| (name.to_string(), values))
        .collect()
}

fn ints(values: &[i64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Int(v)).collect()
}

fn floats(values: &[f64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Float(v)).collect()
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a candidate; an existing entry with the same name is replaced.
    pub fn register(mut self, name: &str, model: impl Into<Estimator>, grid: ParamGrid) -> Self {
        self.models.insert(name.to_string(), model.into());
        self.params.insert(name.to_string(), grid);
        self
    }

    /// The stock set of regressors searched by the training stage.
    pub fn default_candidates() -> Self {
        Self::new()
            .register("Linear Regression", LinearRegression::default(), ParamGrid::new())
            .register(
                "Ridge",
                RidgeRegression::default(),
                grid([("alpha", floats(&[0.1, 1.0, 10.0, 100.0]))]),
            )
            .register(
                "K-Neighbors Regressor",
                KNeighborsRegressor::default(),
                grid([
                    ("n_neighbors", ints(&[5, 7, 9, 11])),
                    ("weights", vec!["uniform".into(), "distance".into()]),
                ]),
            )
            .register(
                "Decision Tree",
                DecisionTreeRegressor::default(),
                grid([(
                    "max_depth",
                    vec![ParamValue::Int(4), ParamValue::Int(8), ParamValue::Int(12), ParamValue::None],
                )]),
            )
            .register(
                "Random Forest Regressor",
                RandomForestRegressor::default(),
                grid([("n_estimators", ints(&[8, 16, 32, 64]))]),
            )
            .register(
                "Gradient Boosting",
                GradientBoostingRegressor::default(),
                grid([
                    ("learning_rate", floats(&[0.1, 0.05, 0.01])),
                    ("subsample", floats(&[0.8, 0.9])),
                    ("n_estimators", ints(&[32, 64, 128])),
                ]),
            )
    }
}

// ---------------------------------------------------------------------------
// ModelTrainer stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ModelTrainerConfig {
    pub trained_model_file_path: PathBuf,
}

impl ModelTrainerConfig {
    pub fn new(artifacts_dir: &Path) -> Self {
        Self {
            trained_model_file_path: artifacts_dir.join("model.json"),
        }
    }
}

/// What the training stage produced.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub best_model_name: String,
    /// Test R² of the saved model.
    pub r2_score: f64,
    pub report: EvaluationReport,
    pub model_path: PathBuf,
}

pub struct ModelTrainer {
    pub trainer_config: ModelTrainerConfig,
    registry: ModelRegistry,
    settings: SearchSettings,
    min_model_score: f64,
}

/// Split an array whose last column is the target.
pub fn split_features_target(arr: &Array2<f64>) -> anyhow::Result<(Array2<f64>, Array1<f64>)> {
    let n = arr.ncols();
    if n < 2 {
        bail!("expected at least one feature column plus the target, got {n} column(s)");
    }
    Ok((arr.slice(s![.., ..n - 1]).to_owned(), arr.column(n - 1).to_owned()))
}

impl ModelTrainer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            trainer_config: ModelTrainerConfig::new(&config.artifacts_path()),
            registry: ModelRegistry::default_candidates(),
            settings: SearchSettings {
                cv: config.cv_folds,
                parallelism: Parallelism::from(config.n_jobs),
            },
            min_model_score: config.min_model_score,
        }
    }

    /// Replace the candidate models searched by this trainer.
    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Evaluate every candidate, keep the one with the best test R², save it
    /// and return its score.  Fails when no model reaches `min_model_score`.
    pub fn initiate_model_trainer(
        &self,
        train_arr: &Array2<f64>,
        test_arr: &Array2<f64>,
    ) -> Result<TrainingOutcome> {
        log::info!("split training and test input data");
        let (x_train, y_train) = split_features_target(train_arr).wrap_err()?;
        let (x_test, y_test) = split_features_target(test_arr).wrap_err()?;

        let evaluation = evaluate_models_with(
            &x_train,
            &y_train,
            &x_test,
            &y_test,
            &self.registry.models,
            &self.registry.params,
            self.settings,
        )?;

        let (best_name, best_score) = self.pick_best(&evaluation).wrap_err()?;
        log::info!("best found model on both training and testing dataset: {best_name} ({best_score:.4})");
        let best_model = evaluation
            .fitted
            .get(&best_name)
            .with_context(|| format!("no fitted estimator for {best_name}"))
            .wrap_err()?;

        let model_path = self.trainer_config.trained_model_file_path.clone();
        save_object(&model_path, best_model)?;

        let (r2, mae) = score_model(best_model, &x_test, &y_test).wrap_err()?;
        log::info!("{best_name}: test R2 {r2:.4}, MAE {mae:.4}");

        Ok(TrainingOutcome {
            best_model_name: best_name,
            r2_score: r2,
            report: evaluation.report,
            model_path,
        })
    }

    fn pick_best(&self, evaluation: &Evaluation) -> anyhow::Result<(String, f64)> {
        let (name, score) = evaluation.best().context("no models were evaluated")?;
        if score < self.min_model_score {
            bail!("No best model found (best was {name} with R2 {score:.4})");
        }
        Ok((name.to_string(), score))
    }
}

fn score_model(model: &Estimator, x: &Array2<f64>, y: &Array1<f64>) -> anyhow::Result<(f64, f64)> {
    let predicted = model.predict(x)?;
    Ok((r2_score(y, &predicted)?, mean_absolute_error(y, &predicted)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn default_registry_has_a_grid_per_model() {
        let registry = ModelRegistry::default_candidates();
        assert_eq!(registry.models.len(), 6);
        assert!(registry.models.keys().eq(registry.params.keys()));
    }

    #[test]
    fn default_grids_apply_cleanly() {
        let registry = ModelRegistry::default_candidates();
        for (name, model) in &registry.models {
            for params in crate::models::expand_grid(&registry.params[name]).unwrap() {
                let mut est = model.clone();
                est.set_params(&params).unwrap_or_else(|e| panic!("{name}: {e:#}"));
            }
        }
    }

    #[test]
    fn features_and_target_split_on_last_column() {
        let arr = array![[1.0, 2.0, 10.0], [3.0, 4.0, 20.0]];
        let (x, y) = split_features_target(&arr).unwrap();
        assert_eq!(x, array![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(y, array![10.0, 20.0]);
        assert!(split_features_target(&array![[1.0], [2.0]]).is_err());
    }

    #[test]
    fn weak_models_are_rejected() {
        let trainer = ModelTrainer::new(&PipelineConfig::default());
        let mut evaluation = Evaluation {
            report: EvaluationReport::new(),
            fitted: BTreeMap::new(),
        };
        assert!(trainer.pick_best(&evaluation).is_err());

        evaluation.report.insert("a".into(), 0.3);
        evaluation.report.insert("b".into(), 0.5);
        let err = trainer.pick_best(&evaluation).unwrap_err();
        assert!(err.to_string().contains("No best model found"));

        evaluation.report.insert("c".into(), 0.8);
        assert_eq!(trainer.pick_best(&evaluation).unwrap(), ("c".to_string(), 0.8));
    }
}
