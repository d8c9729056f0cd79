//! Feature transformation: raw CSV rows → numeric arrays
//!
//! Numeric columns are median-imputed and standardised.  Categorical columns
//! are imputed with their most frequent level, one-hot encoded, and scaled to
//! unit variance without centering.  Output columns are the numeric features
//! followed by the one-hot blocks, each in source column order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::data::loader::load_file;
use crate::data::model::{CellValue, ColumnKind, Dataset};
use crate::error::{Result, WrapErr};
use crate::utils::save_object;

// ---------------------------------------------------------------------------
// Fitted column transforms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    pub median: f64,
    pub mean: f64,
    pub scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    pub most_frequent: String,
    /// Sorted levels seen in training; one output column each.
    pub categories: Vec<String>,
    pub scales: Vec<f64>,
}

/// Population standard deviation, with zero mapped to 1 so constant columns
/// pass through unscaled.
fn scale_of(values: &[f64], mean: f64) -> f64 {
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let std = var.sqrt();
    if std > 0.0 { std } else { 1.0 }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

fn column_of(dataset: &Dataset, name: &str) -> anyhow::Result<usize> {
    dataset
        .column_index(name)
        .with_context(|| format!("column '{name}' not found"))
}

impl NumericColumn {
    fn fit(dataset: &Dataset, idx: usize) -> anyhow::Result<Self> {
        let name = dataset.columns[idx].clone();
        let mut present: Vec<f64> = dataset.column_values(idx).filter_map(CellValue::as_f64).collect();
        if present.is_empty() {
            bail!("numeric column '{name}' has no values to impute from");
        }
        let median = median(&mut present);
        let imputed: Vec<f64> = dataset
            .column_values(idx)
            .map(|v| v.as_f64().unwrap_or(median))
            .collect();
        let mean = imputed.iter().sum::<f64>() / imputed.len() as f64;
        let scale = scale_of(&imputed, mean);
        Ok(NumericColumn { name, median, mean, scale })
    }

    fn transform(&self, cell: &CellValue) -> anyhow::Result<f64> {
        let raw = match cell {
            CellValue::Null => self.median,
            other => other
                .as_f64()
                .with_context(|| format!("column '{}': '{other}' is not a number", self.name))?,
        };
        Ok((raw - self.mean) / self.scale)
    }
}

impl CategoricalColumn {
    fn fit(dataset: &Dataset, idx: usize) -> anyhow::Result<Self> {
        let name = dataset.columns[idx].clone();
        let mut counts: BTreeMap<CellValue, usize> = BTreeMap::new();
        for value in dataset.column_values(idx).filter(|v| !v.is_null()) {
            *counts.entry(value.clone()).or_default() += 1;
        }
        // Ties go to the smallest level.
        let most_frequent = counts
            .iter()
            .fold(None::<(&CellValue, usize)>, |best, (value, &n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((value, n)),
            })
            .map(|(value, _)| value.to_string())
            .with_context(|| format!("categorical column '{name}' has no values to impute from"))?;

        // Sorted as text so `transform_into` can binary-search rendered cells.
        let categories: Vec<String> = dataset
            .unique_values(idx)
            .iter()
            .map(|v| v.to_string())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        let n_rows = dataset.len() as f64;
        let scales = categories
            .iter()
            .map(|level| {
                let mut hits = counts
                    .iter()
                    .filter(|(v, _)| v.to_string() == *level)
                    .map(|(_, &n)| n)
                    .sum::<usize>();
                if *level == most_frequent {
                    hits += dataset.column_values(idx).filter(|v| v.is_null()).count();
                }
                let p = hits as f64 / n_rows;
                let std = (p * (1.0 - p)).sqrt();
                if std > 0.0 { std } else { 1.0 }
            })
            .collect();

        Ok(CategoricalColumn { name, most_frequent, categories, scales })
    }

    fn transform_into(&self, cell: &CellValue, out: &mut [f64]) {
        let level = match cell {
            CellValue::Null => self.most_frequent.clone(),
            other => other.to_string(),
        };
        out.fill(0.0);
        // Unknown levels encode as all zeros.
        if let Ok(pos) = self.categories.binary_search(&level) {
            out[pos] = 1.0 / self.scales[pos];
        }
    }
}

// ---------------------------------------------------------------------------
// Preprocessor
// ---------------------------------------------------------------------------

/// Fitted column transformer, persisted next to the trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessor {
    pub target_column: String,
    pub numeric: Vec<NumericColumn>,
    pub categorical: Vec<CategoricalColumn>,
}

impl Preprocessor {
    /// Learn imputation values, scales and categories from the training set.
    pub fn fit(train: &Dataset, target_column: &str) -> anyhow::Result<Self> {
        column_of(train, target_column)?;
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();

        for (idx, name) in train.columns.iter().enumerate() {
            if name == target_column {
                continue;
            }
            match train.column_kind(idx) {
                ColumnKind::Numeric => numeric.push(NumericColumn::fit(train, idx)?),
                ColumnKind::Categorical => categorical.push(CategoricalColumn::fit(train, idx)?),
            }
        }
        log::info!(
            "numerical columns: {:?}",
            numeric.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );
        log::info!(
            "categorical columns: {:?}",
            categorical.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );

        Ok(Preprocessor {
            target_column: target_column.to_string(),
            numeric,
            categorical,
        })
    }

    pub fn n_features(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|c| c.categories.len()).sum::<usize>()
    }

    /// Output column names, e.g. `reading_score`, `gender_female`.
    pub fn feature_names(&self) -> Vec<String> {
        self.numeric
            .iter()
            .map(|c| c.name.clone())
            .chain(self.categorical.iter().flat_map(|c| {
                c.categories.iter().map(move |level| format!("{}_{level}", c.name))
            }))
            .collect()
    }

    /// Feature matrix for `dataset`; columns are matched by name.
    pub fn transform(&self, dataset: &Dataset) -> anyhow::Result<Array2<f64>> {
        let numeric_idx: Vec<usize> = self
            .numeric
            .iter()
            .map(|c| column_of(dataset, &c.name))
            .collect::<anyhow::Result<_>>()?;
        let categorical_idx: Vec<usize> = self
            .categorical
            .iter()
            .map(|c| column_of(dataset, &c.name))
            .collect::<anyhow::Result<_>>()?;

        let mut out = Array2::<f64>::zeros((dataset.len(), self.n_features()));
        for (r, row) in dataset.rows.iter().enumerate() {
            let mut out_row = out.row_mut(r);
            let slots = out_row
                .as_slice_mut()
                .context("feature row is not contiguous")?;
            let mut col = 0;
            for (column, &idx) in self.numeric.iter().zip(&numeric_idx) {
                slots[col] = column
                    .transform(&row[idx])
                    .with_context(|| format!("row {r}"))?;
                col += 1;
            }
            for (column, &idx) in self.categorical.iter().zip(&categorical_idx) {
                let width = column.categories.len();
                column.transform_into(&row[idx], &mut slots[col..col + width]);
                col += width;
            }
        }
        Ok(out)
    }

    /// Target column as numbers; missing or non-numeric targets are errors.
    pub fn target(&self, dataset: &Dataset) -> anyhow::Result<Array1<f64>> {
        let idx = column_of(dataset, &self.target_column)?;
        dataset
            .column_values(idx)
            .enumerate()
            .map(|(r, v)| {
                v.as_f64().with_context(|| {
                    format!("row {r}: target '{}' has non-numeric value '{v}'", self.target_column)
                })
            })
            .collect()
    }

    /// Features with the target appended as the last column.
    pub fn transform_with_target(&self, dataset: &Dataset) -> anyhow::Result<Array2<f64>> {
        let x = self.transform(dataset)?;
        let y = self.target(dataset)?;
        let arr = ndarray::concatenate(Axis(1), &[x.view(), y.view().insert_axis(Axis(1))])
            .context("appending target column")?;
        Ok(arr)
    }
}

// ---------------------------------------------------------------------------
// DataTransformation stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DataTransformationConfig {
    pub preprocessor_obj_file_path: PathBuf,
}

impl DataTransformationConfig {
    pub fn new(artifacts_dir: &Path) -> Self {
        Self {
            preprocessor_obj_file_path: artifacts_dir.join("preprocessor.json"),
        }
    }
}

pub struct DataTransformation {
    pub transformation_config: DataTransformationConfig,
    target_column: String,
}

impl DataTransformation {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            transformation_config: DataTransformationConfig::new(&config.artifacts_path()),
            target_column: config.target_column.clone(),
        }
    }

    /// Fit the preprocessor on the train CSV, transform both splits, and
    /// save the preprocessor.  Returns `(train_arr, test_arr, preprocessor_path)`
    /// with the target as the last column of each array.
    pub fn initiate_data_transformation(
        &self,
        train_path: &Path,
        test_path: &Path,
    ) -> Result<(Array2<f64>, Array2<f64>, PathBuf)> {
        let (train_arr, test_arr, preprocessor) = self.transform(train_path, test_path).wrap_err()?;

        let path = self.transformation_config.preprocessor_obj_file_path.clone();
        save_object(&path, &preprocessor)?;
        log::info!("saved preprocessing object to {}", path.display());

        Ok((train_arr, test_arr, path))
    }

    fn transform(
        &self,
        train_path: &Path,
        test_path: &Path,
    ) -> anyhow::Result<(Array2<f64>, Array2<f64>, Preprocessor)> {
        let train = load_file(train_path).context("reading train data")?;
        let test = load_file(test_path).context("reading test data")?;
        log::info!("read train and test data completed");

        let preprocessor = Preprocessor::fit(&train, &self.target_column)?;
        log::info!("applying preprocessing object on training and testing data");

        let train_arr = preprocessor
            .transform_with_target(&train)
            .context("transforming train data")?;
        let test_arr = preprocessor
            .transform_with_target(&test)
            .context("transforming test data")?;
        Ok((train_arr, test_arr, preprocessor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[[&str; 3]]) -> Dataset {
        Dataset::new(
            vec!["gender".into(), "reading_score".into(), "math_score".into()],
            rows.iter()
                .map(|r| r.iter().map(|v| CellValue::parse(v)).collect())
                .collect(),
        )
    }

    fn train() -> Dataset {
        table(&[
            ["female", "70", "65"],
            ["male", "80", "75"],
            ["female", "", "70"],
            ["female", "90", "85"],
        ])
    }

    #[test]
    fn layout_is_numeric_then_one_hot() {
        let pre = Preprocessor::fit(&train(), "math_score").unwrap();
        assert_eq!(pre.feature_names(), vec!["reading_score", "gender_female", "gender_male"]);
        let x = pre.transform(&train()).unwrap();
        assert_eq!(x.dim(), (4, 3));
    }

    #[test]
    fn numeric_columns_are_imputed_and_standardised() {
        let pre = Preprocessor::fit(&train(), "math_score").unwrap();
        assert_eq!(pre.numeric[0].median, 80.0);
        let x = pre.transform(&train()).unwrap();
        let col = x.column(0);
        assert!(col.sum().abs() < 1e-9);
        let var = col.iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert!((var - 1.0).abs() < 1e-9);
    }

    #[test]
    fn one_hot_columns_are_scaled_but_not_centred() {
        let pre = Preprocessor::fit(&train(), "math_score").unwrap();
        let x = pre.transform(&train()).unwrap();
        // female appears in 3 of 4 rows
        let p: f64 = 0.75;
        let expected = 1.0 / (p * (1.0 - p)).sqrt();
        assert!((x[[0, 1]] - expected).abs() < 1e-12);
        assert_eq!(x[[0, 2]], 0.0);
        assert!((x[[1, 2]] - expected).abs() < 1e-12);

        let female = x.column(1);
        assert_eq!(female.iter().filter(|&&v| v == 0.0).count(), 1);
        assert!((female.sum() / 4.0 - p * expected).abs() < 1e-12);
    }

    #[test]
    fn unknown_levels_encode_as_zeros() {
        let pre = Preprocessor::fit(&train(), "math_score").unwrap();
        let x = pre.transform(&table(&[["other", "75", "70"]])).unwrap();
        assert_eq!(x[[0, 1]], 0.0);
        assert_eq!(x[[0, 2]], 0.0);
    }

    #[test]
    fn target_is_appended_last() {
        let pre = Preprocessor::fit(&train(), "math_score").unwrap();
        let arr = pre.transform_with_target(&train()).unwrap();
        assert_eq!(arr.ncols(), 4);
        assert_eq!(arr.column(3).to_vec(), vec![65.0, 75.0, 70.0, 85.0]);
    }

    #[test]
    fn missing_target_column_is_an_error() {
        assert!(Preprocessor::fit(&train(), "writing_score").is_err());
        let pre = Preprocessor::fit(&train(), "math_score").unwrap();
        assert!(pre.target(&table(&[["male", "70", ""]])).is_err());
    }
}
