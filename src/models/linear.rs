//! Linear model implementations

use anyhow::{Context, Result, bail};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{ParamValue, Regressor, check_fit_input, check_predict_input, unknown_param};

/// Solve the symmetric positive-definite system `a · w = b` by Cholesky
/// decomposition.  Returns `None` when `a` is not (numerically) positive
/// definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 1e-12 * a[[i, i]].abs() || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L · z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: Lᵀ · w = z
    let mut w = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * w[j];
        }
        w[i] = (z[i] - sum) / l[[i, i]];
    }

    Some(w)
}

/// Solve `(XᵀX + αI) w = Xᵀy`.
///
/// One-hot blocks make `XᵀX` singular, so when Cholesky fails a growing
/// diagonal jitter is added until it succeeds.  The jitter stays tiny relative
/// to the diagonal, which keeps predictions indistinguishable from the
/// minimum-norm least-squares fit.
fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<Array1<f64>> {
    let n = x.ncols();
    let mut xtx = x.t().dot(x);
    let xty = x.t().dot(y);
    for i in 0..n {
        xtx[[i, i]] += alpha;
    }
    if let Some(w) = cholesky_solve(&xtx, &xty) {
        return Ok(w);
    }

    let scale = (xtx.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64).max(1.0);
    let mut jitter = 1e-8 * scale;
    for _ in 0..8 {
        let mut reg = xtx.clone();
        for i in 0..n {
            reg[[i, i]] += jitter;
        }
        if let Some(w) = cholesky_solve(&reg, &xty) {
            log::debug!("normal equations regularised with jitter {jitter:e}");
            return Ok(w);
        }
        jitter *= 100.0;
    }
    bail!("normal equations are singular")
}

/// Shared state of the linear models: coefficients plus intercept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LinearFit {
    coefficients: Option<Array1<f64>>,
    intercept: f64,
}

impl LinearFit {
    fn fit(x: &Array2<f64>, y: &Array1<f64>, alpha: f64, fit_intercept: bool) -> Result<Self> {
        check_fit_input(x, y)?;
        if !fit_intercept {
            let w = solve_normal_equations(x, y, alpha)?;
            return Ok(LinearFit { coefficients: Some(w), intercept: 0.0 });
        }

        // Centering keeps the intercept out of the penalty.
        let x_mean = x.mean_axis(Axis(0)).context("empty design matrix")?;
        let y_mean = y.mean().context("empty target")?;
        let xc = x - &x_mean;
        let yc = y - y_mean;
        let w = solve_normal_equations(&xc, &yc, alpha)?;
        let intercept = y_mean - x_mean.dot(&w);
        Ok(LinearFit { coefficients: Some(w), intercept })
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.coefficients.as_ref().context("model is not fitted")?;
        check_predict_input(x, w.len())?;
        Ok(x.dot(w) + self.intercept)
    }
}

// ---------------------------------------------------------------------------
// LinearRegression – ordinary least squares
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    pub fit_intercept: bool,
    fitted: LinearFit,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self {
            fit_intercept: true,
            fitted: LinearFit::default(),
        }
    }
}

impl LinearRegression {
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fitted.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.fitted.intercept
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fitted = LinearFit::fit(x, y, 0.0, self.fit_intercept)?;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.predict(x)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "fit_intercept" => self.fit_intercept = value.as_bool(name)?,
            _ => return Err(unknown_param("LinearRegression", name)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.fitted.coefficients.is_some()
    }
}

// ---------------------------------------------------------------------------
// RidgeRegression – L2-penalised least squares
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    /// L2 penalty strength, ≥ 0.
    pub alpha: f64,
    pub fit_intercept: bool,
    fitted: LinearFit,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            fit_intercept: true,
            fitted: LinearFit::default(),
        }
    }
}

impl RidgeRegression {
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fitted.coefficients.as_ref()
    }
}

impl Regressor for RidgeRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.alpha < 0.0 {
            bail!("alpha must be >= 0, got {}", self.alpha);
        }
        self.fitted = LinearFit::fit(x, y, self.alpha, self.fit_intercept)?;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.predict(x)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "alpha" => self.alpha = value.as_f64(name)?,
            "fit_intercept" => self.fit_intercept = value.as_bool(name)?,
            _ => return Err(unknown_param("Ridge", name)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.fitted.coefficients.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_data;
    use ndarray::array;

    #[test]
    fn ols_recovers_exact_coefficients() {
        let (x, y) = test_data::linear();
        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();

        let w = model.coefficients().unwrap();
        assert!((w[0] - 3.0).abs() < 1e-8);
        assert!((w[1] + 2.0).abs() < 1e-8);
        assert!((model.intercept() - 5.0).abs() < 1e-8);
    }

    #[test]
    fn collinear_columns_still_fit() {
        // Third column duplicates the first, like a redundant one-hot level.
        let x = array![[1.0, 0.0, 1.0], [2.0, 1.0, 2.0], [3.0, 0.0, 3.0], [4.0, 1.0, 4.0]];
        let y = array![2.0, 5.0, 6.0, 9.0];
        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-4, "{p} vs {t}");
        }
    }

    #[test]
    fn ridge_shrinks_coefficients() {
        let (x, y) = test_data::linear();
        let mut weak = RidgeRegression::default().with_alpha(0.0);
        let mut strong = RidgeRegression::default().with_alpha(1000.0);
        weak.fit(&x, &y).unwrap();
        strong.fit(&x, &y).unwrap();
        let norm = |w: &Array1<f64>| w.dot(w).sqrt();
        assert!(norm(strong.coefficients().unwrap()) < norm(weak.coefficients().unwrap()));
    }

    #[test]
    fn predict_checks_feature_count() {
        let (x, y) = test_data::linear();
        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();
        assert!(model.predict(&Array2::zeros((2, 5))).is_err());
    }
}
