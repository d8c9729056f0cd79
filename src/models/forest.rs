//! Random Forest regressor

use anyhow::{Result, bail};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTreeRegressor, TreeParams};
use super::{ParamValue, Regressor, check_fit_input, check_predict_input, unknown_param};

/// Bagged ensemble of regression trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    pub n_estimators: usize,
    pub tree_params: TreeParams,
    /// Draw a bootstrap sample per tree instead of using every row.
    pub bootstrap: bool,
    pub random_state: u64,
    trees: Vec<DecisionTreeRegressor>,
    n_features: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            tree_params: TreeParams::default(),
            bootstrap: true,
            random_state: 42,
            trees: Vec::new(),
            n_features: 0,
        }
    }
}

impl RandomForestRegressor {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn fit_tree(&self, x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<DecisionTreeRegressor> {
        let mut tree = DecisionTreeRegressor::new(self.tree_params.clone(), seed);
        if !self.bootstrap {
            tree.fit(x, y)?;
            return Ok(tree);
        }
        let n = x.nrows();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
        let x_boot = x.select(Axis(0), &sample);
        let y_boot = y.select(Axis(0), &sample);
        tree.fit(&x_boot, &y_boot)?;
        Ok(tree)
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            bail!("n_estimators must be >= 1");
        }

        // Per-tree seeds are drawn up front so the result does not depend on
        // how rayon schedules the trees.
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let seeds: Vec<u64> = (0..self.n_estimators).map(|_| rng.gen()).collect();

        let trees = seeds
            .par_iter()
            .map(|&seed| self.fit_tree(x, y, seed))
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            bail!("model is not fitted");
        }
        check_predict_input(x, self.n_features)?;

        let mut total = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            total += &tree.predict(x)?;
        }
        Ok(total / self.trees.len() as f64)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        if self.tree_params.set_param(name, value)? {
            return Ok(());
        }
        match name {
            "n_estimators" => self.n_estimators = value.as_usize(name)?,
            "bootstrap" => self.bootstrap = value.as_bool(name)?,
            "random_state" => self.random_state = value.as_usize(name)? as u64,
            _ => return Err(unknown_param("RandomForestRegressor", name)),
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
    fn forest_fits_steps() {
        let (x, y) = test_data::steps();
        let mut forest = RandomForestRegressor::default().with_n_estimators(16);
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.n_trees(), 16);
        assert!(r2_score(&y, &forest.predict(&x).unwrap()).unwrap() > 0.9);
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = test_data::linear();
        let mut a = RandomForestRegressor::default().with_n_estimators(8);
        let mut b = RandomForestRegressor::default().with_n_estimators(8);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn zero_estimators_is_an_error() {
        let (x, y) = test_data::steps();
        let mut forest = RandomForestRegressor::default().with_n_estimators(0);
        assert!(forest.fit(&x, &y).is_err());
    }
}
