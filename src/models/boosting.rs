//! Gradient Boosting regressor
//!
//! Least-squares boosting: each round fits a shallow tree to the current
//! residuals and adds it, shrunk by the learning rate.

use anyhow::{Result, bail};
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTreeRegressor, TreeParams};
use super::{ParamValue, Regressor, check_fit_input, check_predict_input, unknown_param};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    pub n_estimators: usize,
    /// Shrinkage applied to every tree, in `(0, 1]`.
    pub learning_rate: f64,
    /// Fraction of rows sampled (without replacement) per round.
    pub subsample: f64,
    pub tree_params: TreeParams,
    pub random_state: u64,
    initial_prediction: f64,
    /// Learning rate the stored trees were fitted with.
    fitted_rate: f64,
    trees: Vec<DecisionTreeRegressor>,
    n_features: usize,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            subsample: 1.0,
            tree_params: TreeParams {
                max_depth: Some(3),
                ..TreeParams::default()
            },
            random_state: 42,
            initial_prediction: 0.0,
            fitted_rate: 0.0,
            trees: Vec::new(),
            n_features: 0,
        }
    }
}

impl GradientBoostingRegressor {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            bail!("n_estimators must be >= 1");
        }
        if !(self.learning_rate > 0.0) {
            bail!("learning_rate must be > 0, got {}", self.learning_rate);
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            bail!("subsample must be in (0, 1], got {}", self.subsample);
        }
        Ok(())
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.validate()?;

        let n_samples = x.nrows();
        let initial = y.sum() / n_samples as f64;
        let mut predictions = Array1::from_elem(n_samples, initial);
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let n_sub = ((self.subsample * n_samples as f64) as usize).max(1);

        let mut trees = Vec::with_capacity(self.n_estimators);
        for round in 0..self.n_estimators {
            let residuals = y - &predictions;

            let mut tree = DecisionTreeRegressor::new(
                self.tree_params.clone(),
                self.random_state.wrapping_add(round as u64),
            );
            if n_sub < n_samples {
                let rows = rand::seq::index::sample(&mut rng, n_samples, n_sub).into_vec();
                tree.fit(&x.select(Axis(0), &rows), &residuals.select(Axis(0), &rows))?;
            } else {
                tree.fit(x, &residuals)?;
            }

            predictions.scaled_add(self.learning_rate, &tree.predict(x)?);
            trees.push(tree);
        }

        self.initial_prediction = initial;
        self.fitted_rate = self.learning_rate;
        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            bail!("model is not fitted");
        }
        check_predict_input(x, self.n_features)?;

        let mut out = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            out.scaled_add(self.fitted_rate, &tree.predict(x)?);
        }
        Ok(out)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        if self.tree_params.set_param(name, value)? {
            return Ok(());
        }
        match name {
            "n_estimators" => self.n_estimators = value.as_usize(name)?,
            "learning_rate" => self.learning_rate = value.as_f64(name)?,
            "subsample" => self.subsample = value.as_f64(name)?,
            "random_state" => self.random_state = value.as_usize(name)? as u64,
            _ => return Err(unknown_param("GradientBoostingRegressor", name)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::r2_score;
    use crate::models::test_data;

    #[test]
    fn boosting_reduces_training_error() {
        let (x, y) = test_data::linear();
        let mut few = GradientBoostingRegressor::default().with_n_estimators(2);
        let mut many = GradientBoostingRegressor::default().with_n_estimators(100);
        few.fit(&x, &y).unwrap();
        many.fit(&x, &y).unwrap();

        let r2_few = r2_score(&y, &few.predict(&x).unwrap()).unwrap();
        let r2_many = r2_score(&y, &many.predict(&x).unwrap()).unwrap();
        assert!(r2_many > r2_few);
        assert!(r2_many > 0.95);
    }

    #[test]
    fn subsampling_is_deterministic() {
        let (x, y) = test_data::linear();
        let mut model = GradientBoostingRegressor::default().with_n_estimators(20);
        model.set_param("subsample", &ParamValue::Float(0.7)).unwrap();
        let mut again = model.clone();
        model.fit(&x, &y).unwrap();
        again.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), again.predict(&x).unwrap());
    }

    #[test]
    fn rejects_bad_learning_rate() {
        let (x, y) = test_data::linear();
        let mut model = GradientBoostingRegressor::default().with_learning_rate(0.0);
        assert!(model.fit(&x, &y).is_err());
    }
}
