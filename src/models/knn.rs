//! K-Nearest Neighbors regression

use anyhow::{Context, Result, bail};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{ParamValue, Regressor, check_fit_input, check_predict_input, unknown_param};

/// How neighbor targets are averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightScheme {
    /// Plain mean of the k targets.
    Uniform,
    /// Inverse-distance weighted mean; exact matches take all the weight.
    Distance,
}

/// KNN regressor using Euclidean distance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNeighborsRegressor {
    pub n_neighbors: usize,
    pub weights: WeightScheme,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KNeighborsRegressor {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: WeightScheme::Uniform,
            x_train: None,
            y_train: None,
        }
    }
}

impl KNeighborsRegressor {
    pub fn with_n_neighbors(mut self, k: usize) -> Self {
        self.n_neighbors = k;
        self
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    fn predict_one(&self, query: ArrayView1<f64>, x_train: &Array2<f64>, y_train: &Array1<f64>) -> f64 {
        let mut dists: Vec<(f64, usize)> = x_train
            .outer_iter()
            .enumerate()
            .map(|(i, row)| {
                let d: f64 = row
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum();
                (d.sqrt(), i)
            })
            .collect();

        let k = self.n_neighbors;
        if k < dists.len() {
            dists.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            dists.truncate(k);
        }

        match self.weights {
            WeightScheme::Uniform => {
                dists.iter().map(|&(_, i)| y_train[i]).sum::<f64>() / dists.len() as f64
            }
            WeightScheme::Distance => {
                let exact: Vec<f64> = dists
                    .iter()
                    .filter(|(d, _)| *d == 0.0)
                    .map(|&(_, i)| y_train[i])
                    .collect();
                if !exact.is_empty() {
                    return exact.iter().sum::<f64>() / exact.len() as f64;
                }
                let (num, den) = dists.iter().fold((0.0, 0.0), |(num, den), &(d, i)| {
                    (num + y_train[i] / d, den + 1.0 / d)
                });
                num / den
            }
        }
    }
}

impl Regressor for KNeighborsRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_neighbors == 0 {
            bail!("n_neighbors must be >= 1");
        }
        if self.n_neighbors > x.nrows() {
            bail!(
                "Expected n_neighbors <= n_samples, but n_samples = {}, n_neighbors = {}",
                x.nrows(),
                self.n_neighbors
            );
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let x_train = self.x_train.as_ref().context("model is not fitted")?;
        let y_train = self.y_train.as_ref().context("model is not fitted")?;
        check_predict_input(x, x_train.ncols())?;

        let rows: Vec<ArrayView1<f64>> = x.outer_iter().collect();
        let preds: Vec<f64> = rows
            .par_iter()
            .map(|row| self.predict_one(row.view(), x_train, y_train))
            .collect();
        Ok(Array1::from_vec(preds))
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_neighbors" => self.n_neighbors = value.as_usize(name)?,
            "weights" => {
                self.weights = match value.as_str(name)? {
                    "uniform" => WeightScheme::Uniform,
                    "distance" => WeightScheme::Distance,
                    other => bail!("weights must be 'uniform' or 'distance', got '{other}'"),
                }
            }
            _ => return Err(unknown_param("KNeighborsRegressor", name)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.x_train.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line() -> (Array2<f64>, Array1<f64>) {
        (array![[0.0], [1.0], [2.0], [3.0], [10.0]], array![0.0, 1.0, 2.0, 3.0, 10.0])
    }

    #[test]
    fn uniform_average_of_nearest() {
        let (x, y) = line();
        let mut knn = KNeighborsRegressor::default().with_n_neighbors(2);
        knn.fit(&x, &y).unwrap();
        let pred = knn.predict(&array![[0.4], [9.0]]).unwrap();
        assert!((pred[0] - 0.5).abs() < 1e-12);
        assert!((pred[1] - 6.5).abs() < 1e-12);
    }

    #[test]
    fn distance_weights_favor_closer_points() {
        let (x, y) = line();
        let mut knn = KNeighborsRegressor::default()
            .with_n_neighbors(2)
            .with_weights(WeightScheme::Distance);
        knn.fit(&x, &y).unwrap();
        let pred = knn.predict(&array![[0.25], [3.0]]).unwrap();
        assert!(pred[0] < 0.5);
        assert_eq!(pred[1], 3.0);
    }

    #[test]
    fn too_many_neighbors_is_an_error() {
        let (x, y) = line();
        let mut knn = KNeighborsRegressor::default().with_n_neighbors(6);
        assert!(knn.fit(&x, &y).is_err());
    }
}
