//! Cross-validation and exhaustive hyperparameter search

use anyhow::{Context, Result, bail};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;

use crate::models::{Estimator, ParamGrid, ParamSet, Regressor, describe, expand_grid};

// ---------------------------------------------------------------------------
// K-Fold splitting
// ---------------------------------------------------------------------------

/// A single train/validation split
#[derive(Debug, Clone)]
pub struct CvSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Consecutive, unshuffled folds; the first `n_samples % n_splits` folds get
/// one extra sample.
pub fn k_fold(n_samples: usize, n_splits: usize) -> Result<Vec<CvSplit>> {
    if n_splits < 2 {
        bail!("n_splits must be at least 2, got {n_splits}");
    }
    if n_samples < n_splits {
        bail!("Cannot have number of splits n_splits={n_splits} greater than the number of samples: n_samples={n_samples}");
    }

    let base = n_samples / n_splits;
    let remainder = n_samples % n_splits;
    let mut splits = Vec::with_capacity(n_splits);
    let mut start = 0;

    for fold in 0..n_splits {
        let size = if fold < remainder { base + 1 } else { base };
        let end = start + size;
        splits.push(CvSplit {
            train_indices: (0..start).chain(end..n_samples).collect(),
            test_indices: (start..end).collect(),
        });
        start = end;
    }

    Ok(splits)
}

// ---------------------------------------------------------------------------
// Grid search
// ---------------------------------------------------------------------------

/// Worker budget for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// Every available core (rayon's global pool).
    #[default]
    AllCores,
    /// Exactly this many workers; `Threads(1)` runs inline.
    Threads(usize),
}

impl From<Option<usize>> for Parallelism {
    fn from(n_jobs: Option<usize>) -> Self {
        match n_jobs {
            None => Parallelism::AllCores,
            Some(n) => Parallelism::Threads(n.max(1)),
        }
    }
}

/// Cross-validated score of one candidate.
#[derive(Debug, Clone)]
pub struct CandidateScore {
    pub params: ParamSet,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

/// Outcome of [`GridSearchCv::fit`].
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best_params: ParamSet,
    pub best_score: f64,
    /// Best configuration refitted on the full training set.
    pub best_estimator: Estimator,
    pub candidates: Vec<CandidateScore>,
}

/// Exhaustive search over a parameter grid with K-fold cross-validation,
/// scored by R².
#[derive(Debug, Clone)]
pub struct GridSearchCv {
    estimator: Estimator,
    param_grid: ParamGrid,
    cv: usize,
    parallelism: Parallelism,
}

impl GridSearchCv {
    pub fn new(estimator: Estimator, param_grid: ParamGrid) -> Self {
        Self {
            estimator,
            param_grid,
            cv: 3,
            parallelism: Parallelism::AllCores,
        }
    }

    pub fn with_cv(mut self, folds: usize) -> Self {
        self.cv = folds;
        self
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Score every candidate, then refit the best one on all of `(x, y)`.
    ///
    /// The best candidate has the highest mean fold score; ties go to the
    /// earliest candidate in grid order.  Any fit or predict failure aborts
    /// the search.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult> {
        if x.nrows() != y.len() {
            bail!("x has {} rows but y has {} values", x.nrows(), y.len());
        }
        let candidates = expand_grid(&self.param_grid)?;
        let splits = k_fold(x.nrows(), self.cv)?;

        // Fail fast on bad parameter names before any fitting.
        let configured: Vec<Estimator> = candidates
            .iter()
            .map(|params| {
                let mut est = self.estimator.clone();
                est.set_params(params)
                    .with_context(|| format!("configuring {}", self.estimator.kind()))?;
                Ok(est)
            })
            .collect::<Result<_>>()?;

        let jobs: Vec<(usize, &CvSplit)> = (0..configured.len())
            .flat_map(|c| splits.iter().map(move |s| (c, s)))
            .collect();

        let run = || -> Result<Vec<f64>> {
            match self.parallelism {
                Parallelism::Threads(1) => jobs
                    .iter()
                    .map(|&(c, split)| score_fold(&configured[c], x, y, split))
                    .collect(),
                _ => jobs
                    .par_iter()
                    .map(|&(c, split)| score_fold(&configured[c], x, y, split))
                    .collect(),
            }
        };

        let scores = match self.parallelism {
            Parallelism::Threads(n) if n > 1 => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .context("building grid search thread pool")?
                .install(run)?,
            _ => run()?,
        };

        let n_folds = splits.len();
        let scored: Vec<CandidateScore> = candidates
            .into_iter()
            .zip(scores.chunks(n_folds))
            .map(|(params, folds)| CandidateScore {
                mean_score: folds.iter().sum::<f64>() / n_folds as f64,
                fold_scores: folds.to_vec(),
                params,
            })
            .collect();

        let best_idx = scored
            .iter()
            .enumerate()
            .filter(|(_, c)| c.mean_score.is_finite())
            .fold(None::<(usize, f64)>, |best, (i, c)| match best {
                Some((_, s)) if s >= c.mean_score => best,
                _ => Some((i, c.mean_score)),
            })
            .map(|(i, _)| i)
            .context("no candidate produced a finite cross-validation score")?;

        let mut best_estimator = configured[best_idx].clone();
        best_estimator
            .fit(x, y)
            .with_context(|| format!("refitting {} on the full training set", best_estimator.kind()))?;

        let best = &scored[best_idx];
        log::info!(
            "{}: best of {} candidates {} with mean CV R2 {:.4}",
            best_estimator.kind(),
            scored.len(),
            describe(&best.params),
            best.mean_score
        );

        Ok(GridSearchResult {
            best_params: best.params.clone(),
            best_score: best.mean_score,
            best_estimator,
            candidates: scored,
        })
    }
}

fn score_fold(template: &Estimator, x: &Array2<f64>, y: &Array1<f64>, split: &CvSplit) -> Result<f64> {
    let x_train = x.select(Axis(0), &split.train_indices);
    let y_train = y.select(Axis(0), &split.train_indices);
    let x_val = x.select(Axis(0), &split.test_indices);
    let y_val = y.select(Axis(0), &split.test_indices);

    let mut est = template.clone();
    est.fit(&x_train, &y_train)
        .with_context(|| format!("fitting {} on a CV fold", est.kind()))?;
    est.score(&x_val, &y_val)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DecisionTreeRegressor, KNeighborsRegressor, ParamValue, RidgeRegression};
    use crate::models::test_data;

    #[test]
    fn k_fold_sizes_and_coverage() {
        let splits = k_fold(10, 3).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_eq!(splits[0].test_indices, vec![0, 1, 2, 3]);
        for s in &splits {
            assert_eq!(s.train_indices.len() + s.test_indices.len(), 10);
            assert!(s.test_indices.iter().all(|i| !s.train_indices.contains(i)));
        }
    }

    #[test]
    fn k_fold_rejects_bad_counts() {
        assert!(k_fold(10, 1).is_err());
        assert!(k_fold(2, 3).is_err());
    }

    #[test]
    fn picks_the_better_depth() {
        let (x, y) = test_data::steps();
        // Interleave rows so every unshuffled fold sees every step.
        let order: Vec<usize> = (0..40).map(|i| (i * 7) % 40).collect();
        let x = x.select(Axis(0), &order);
        let y = y.select(Axis(0), &order);

        let mut grid = ParamGrid::new();
        grid.insert("max_depth".into(), vec![ParamValue::Int(0), ParamValue::Int(3)]);
        let search = GridSearchCv::new(DecisionTreeRegressor::default().into(), grid);
        let result = search.fit(&x, &y).unwrap();

        assert_eq!(result.best_params["max_depth"], ParamValue::Int(3));
        assert_eq!(result.candidates.len(), 2);
        assert_eq!(result.candidates[0].fold_scores.len(), 3);
        assert!(result.best_estimator.is_fitted());
    }

    #[test]
    fn thread_budgets_agree() {
        let (x, y) = test_data::linear();
        let mut grid = ParamGrid::new();
        grid.insert("alpha".into(), vec![0.1.into(), 10.0.into(), 100.0.into()]);
        let search = GridSearchCv::new(RidgeRegression::default().into(), grid);

        let all = search.clone().fit(&x, &y).unwrap();
        let one = search.clone().with_parallelism(Parallelism::Threads(1)).fit(&x, &y).unwrap();
        let two = search.with_parallelism(Parallelism::Threads(2)).fit(&x, &y).unwrap();
        assert_eq!(all.best_params, one.best_params);
        assert_eq!(one.best_score, two.best_score);
    }

    #[test]
    fn bad_parameter_name_fails_before_fitting() {
        let (x, y) = test_data::linear();
        let mut grid = ParamGrid::new();
        grid.insert("depth".into(), vec![ParamValue::Int(3)]);
        let search = GridSearchCv::new(KNeighborsRegressor::default().into(), grid);
        assert!(search.fit(&x, &y).is_err());
    }
}
