//! Regression estimators
//!
//! Every estimator implements [`Regressor`]; the serializable [`Estimator`]
//! enum wraps them so model registries, grid search and persistence can work
//! over a closed set of concrete types:
//! - Linear models (OLS, Ridge)
//! - K-Nearest Neighbors
//! - Decision tree, Random Forest and Gradient Boosting regressors

pub mod boosting;
pub mod forest;
pub mod knn;
pub mod linear;
pub mod params;
pub mod tree;

pub use boosting::GradientBoostingRegressor;
pub use forest::RandomForestRegressor;
pub use knn::{KNeighborsRegressor, WeightScheme};
pub use linear::{LinearRegression, RidgeRegression};
pub use params::{ParamGrid, ParamSet, ParamValue, describe, expand_grid};
pub use tree::{DecisionTreeRegressor, MaxFeatures};

use anyhow::{Result, bail};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::metrics::r2_score;

/// Trait for regression models
pub trait Regressor: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict targets for `x`; fails before `fit`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Set one hyperparameter by name
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;

    fn is_fitted(&self) -> bool;
}

/// Shared shape checks for `fit`.
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        bail!("x has {} rows but y has {} values", x.nrows(), y.len());
    }
    if x.nrows() == 0 {
        bail!("cannot fit on an empty dataset");
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        bail!("input contains NaN or infinite values");
    }
    Ok(())
}

/// Shared shape checks for `predict`.
pub(crate) fn check_predict_input(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        bail!(
            "x has {} features, but the model was fitted with {}",
            x.ncols(),
            n_features
        );
    }
    Ok(())
}

pub(crate) fn unknown_param(model: &str, name: &str) -> anyhow::Error {
    anyhow::anyhow!("invalid parameter '{name}' for estimator {model}")
}

// ---------------------------------------------------------------------------
// Estimator – the closed set of models a registry can hold
// ---------------------------------------------------------------------------

/// A regression model of any supported kind, fitted or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Estimator {
    LinearRegression(LinearRegression),
    Ridge(RidgeRegression),
    KNeighbors(KNeighborsRegressor),
    DecisionTree(DecisionTreeRegressor),
    RandomForest(RandomForestRegressor),
    GradientBoosting(GradientBoostingRegressor),
}

impl Estimator {
    fn inner(&self) -> &dyn Regressor {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::Ridge(m) => m,
            Estimator::KNeighbors(m) => m,
            Estimator::DecisionTree(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::GradientBoosting(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::Ridge(m) => m,
            Estimator::KNeighbors(m) => m,
            Estimator::DecisionTree(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::GradientBoosting(m) => m,
        }
    }

    /// Human-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::LinearRegression(_) => "LinearRegression",
            Estimator::Ridge(_) => "Ridge",
            Estimator::KNeighbors(_) => "KNeighborsRegressor",
            Estimator::DecisionTree(_) => "DecisionTreeRegressor",
            Estimator::RandomForest(_) => "RandomForestRegressor",
            Estimator::GradientBoosting(_) => "GradientBoostingRegressor",
        }
    }

    /// Apply every parameter of `params`, failing on the first bad one.
    pub fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params {
            self.set_param(name, value)?;
        }
        Ok(())
    }

    /// R² of the model's predictions on `(x, y)`.
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let pred = self.predict(x)?;
        r2_score(y, &pred)
    }
}

impl Regressor for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        self.inner_mut().set_param(name, value)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }
}

impl From<LinearRegression> for Estimator {
    fn from(m: LinearRegression) -> Self {
        Estimator::LinearRegression(m)
    }
}

impl From<RidgeRegression> for Estimator {
    fn from(m: RidgeRegression) -> Self {
        Estimator::Ridge(m)
    }
}

impl From<KNeighborsRegressor> for Estimator {
    fn from(m: KNeighborsRegressor) -> Self {
        Estimator::KNeighbors(m)
    }
}

impl From<DecisionTreeRegressor> for Estimator {
    fn from(m: DecisionTreeRegressor) -> Self {
        Estimator::DecisionTree(m)
    }
}

impl From<RandomForestRegressor> for Estimator {
    fn from(m: RandomForestRegressor) -> Self {
        Estimator::RandomForest(m)
    }
}

impl From<GradientBoostingRegressor> for Estimator {
    fn from(m: GradientBoostingRegressor) -> Self {
        Estimator::GradientBoosting(m)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimator_dispatches_and_scores() {
        let (x, y) = test_data::linear();
        let mut est: Estimator = LinearRegression::default().into();
        assert!(!est.is_fitted());
        assert!(est.predict(&x).is_err());

        est.fit(&x, &y).unwrap();
        assert!(est.is_fitted());
        assert!(est.score(&x, &y).unwrap() > 0.999);
    }

    #[test]
    fn set_params_rejects_unknown_names() {
        let mut est: Estimator = RidgeRegression::default().into();
        let mut params = ParamSet::new();
        params.insert("alpha".into(), ParamValue::Float(2.0));
        est.set_params(&params).unwrap();

        params.insert("n_neighbors".into(), ParamValue::Int(3));
        assert!(est.set_params(&params).is_err());
    }

    #[test]
    fn fit_rejects_mismatched_shapes() {
        let (x, _) = test_data::linear();
        let mut est: Estimator = KNeighborsRegressor::default().into();
        assert!(est.fit(&x, &Array1::zeros(3)).is_err());
    }

    #[test]
    fn fitted_estimator_survives_json() {
        let (x, y) = test_data::steps();
        let mut est: Estimator = DecisionTreeRegressor::default().into();
        est.fit(&x, &y).unwrap();

        let json = serde_json::to_string(&est).unwrap();
        assert!(json.contains("\"kind\":\"DecisionTree\""));
        let back: Estimator = serde_json::from_str(&json).unwrap();
        assert_eq!(back.predict(&x).unwrap(), est.predict(&x).unwrap());
    }
}
