use std::collections::BTreeMap;

use anyhow::{Context, bail};
use ndarray::{Array1, Array2};

use crate::error::{Result, WrapErr};
use crate::metrics::r2_score;
use crate::model_selection::{GridSearchCv, Parallelism};
use crate::models::{Estimator, ParamGrid, Regressor};

/// Model name → test-set R².
pub type EvaluationReport = BTreeMap<String, f64>;

/// Result of [`evaluate_models`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Test R² of each model's best configuration.
    pub report: EvaluationReport,
    /// Each model's best configuration, refitted on the training set.
    pub fitted: BTreeMap<String, Estimator>,
}

impl Evaluation {
    /// Highest-scoring model name and score; ties go to the first name.
    pub fn best(&self) -> Option<(&str, f64)> {
        self.report
            .iter()
            .fold(None, |best: Option<(&str, f64)>, (name, &score)| match best {
                Some((_, s)) if s >= score => best,
                _ => Some((name.as_str(), score)),
            })
    }
}

/// Search settings shared by every model in an evaluation.
#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    pub cv: usize,
    pub parallelism: Parallelism,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            cv: 3,
            parallelism: Parallelism::AllCores,
        }
    }
}

/// Grid-search every model on the training data and score its best
/// configuration on the test data, with 3-fold CV on every core.
///
/// `models` is not modified; the fitted estimators come back in
/// [`Evaluation::fitted`].  Every model needs a grid in `params` (an empty
/// grid means "defaults only").  Any failure aborts the whole evaluation.
pub fn evaluate_models(
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    models: &BTreeMap<String, Estimator>,
    params: &BTreeMap<String, ParamGrid>,
) -> Result<Evaluation> {
    evaluate_models_with(x_train, y_train, x_test, y_test, models, params, SearchSettings::default())
}

/// [`evaluate_models`] with explicit fold count and worker budget.
pub fn evaluate_models_with(
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    models: &BTreeMap<String, Estimator>,
    params: &BTreeMap<String, ParamGrid>,
    settings: SearchSettings,
) -> Result<Evaluation> {
    run_evaluation(x_train, y_train, x_test, y_test, models, params, settings).wrap_err()
}

fn run_evaluation(
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    models: &BTreeMap<String, Estimator>,
    params: &BTreeMap<String, ParamGrid>,
    settings: SearchSettings,
) -> anyhow::Result<Evaluation> {
    let missing: Vec<&str> = models
        .keys()
        .filter(|name| !params.contains_key(*name))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        bail!("no parameter grid for model(s): {}", missing.join(", "));
    }
    for name in params.keys().filter(|name| !models.contains_key(*name)) {
        log::warn!("parameter grid for '{name}' has no matching model; ignored");
    }

    let mut report = EvaluationReport::new();
    let mut fitted = BTreeMap::new();

    for (name, model) in models {
        log::info!("evaluating {name}");
        let search = GridSearchCv::new(model.clone(), params[name].clone())
            .with_cv(settings.cv)
            .with_parallelism(settings.parallelism);
        let result = search
            .fit(x_train, y_train)
            .with_context(|| format!("grid search for {name}"))?;

        let best = result.best_estimator;
        let y_test_pred = best.predict(x_test).with_context(|| format!("predicting with {name}"))?;
        let test_score = r2_score(y_test, &y_test_pred).with_context(|| format!("scoring {name}"))?;
        log::info!("{name}: test R2 {test_score:.4}");

        report.insert(name.clone(), test_score);
        fitted.insert(name.clone(), best);
    }

    Ok(Evaluation { report, fitted })
}
