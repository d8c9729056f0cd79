//! Hyperparameter values and grids

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// A single hyperparameter value.
///
/// Untagged so grids read naturally from JSON: `{"alpha": [0.1, 1, 10]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    None,
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(s) => write!(f, "'{s}'"),
            ParamValue::None => write!(f, "None"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl ParamValue {
    /// Non-negative integer parameter.
    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(i) if *i >= 0 => Ok(*i as usize),
            other => bail!("parameter '{name}' expects a non-negative integer, got {other}"),
        }
    }

    /// Integer parameter where `None` means "unbounded".
    pub fn as_opt_usize(&self, name: &str) -> Result<Option<usize>> {
        match self {
            ParamValue::None => Ok(None),
            other => other.as_usize(name).map(Some),
        }
    }

    /// Numeric parameter; integers are widened.
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(i) => Ok(*i as f64),
            other => bail!("parameter '{name}' expects a number, got {other}"),
        }
    }

    pub fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            ParamValue::Bool(b) => Ok(*b),
            other => bail!("parameter '{name}' expects a boolean, got {other}"),
        }
    }

    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Str(s) => Ok(s),
            other => bail!("parameter '{name}' expects a string, got {other}"),
        }
    }
}

/// One concrete configuration: parameter name → value.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Search space: parameter name → candidate values.
pub type ParamGrid = BTreeMap<String, Vec<ParamValue>>;

/// Render a parameter set as `{a: 1, b: 'x'}` for logs.
pub fn describe(params: &ParamSet) -> String {
    let body: Vec<String> = params.iter().map(|(k, v)| format!("{k}: {v}")).collect();
    format!("{{{}}}", body.join(", "))
}

/// Expand a grid into every combination.
///
/// Names are visited in sorted order with the last name varying fastest.
/// An empty grid yields a single empty combination (the estimator defaults).
pub fn expand_grid(grid: &ParamGrid) -> Result<Vec<ParamSet>> {
    let mut combos = vec![ParamSet::new()];
    for (name, values) in grid {
        if values.is_empty() {
            bail!("parameter grid for '{name}' has no values");
        }
        combos = combos
            .into_iter()
            .flat_map(|base| {
                values.iter().map(move |value| {
                    let mut next = base.clone();
                    next.insert(name.clone(), value.clone());
                    next
                })
            })
            .collect();
    }
    Ok(combos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_grid_is_one_default_candidate() {
        let combos = expand_grid(&ParamGrid::new()).unwrap();
        assert_eq!(combos, vec![ParamSet::new()]);
    }

    #[test]
    fn cartesian_product_in_sorted_order() {
        let mut grid = ParamGrid::new();
        grid.insert("n_estimators".into(), vec![8_i64.into(), 16_i64.into()]);
        grid.insert("learning_rate".into(), vec![0.1.into(), 0.01.into(), 0.05.into()]);

        let combos = expand_grid(&grid).unwrap();
        assert_eq!(combos.len(), 6);
        assert_eq!(combos[0]["learning_rate"], ParamValue::Float(0.1));
        assert_eq!(combos[0]["n_estimators"], ParamValue::Int(8));
        assert_eq!(combos[1]["n_estimators"], ParamValue::Int(16));
        assert_eq!(combos[5]["learning_rate"], ParamValue::Float(0.05));
    }

    #[test]
    fn empty_value_list_is_rejected() {
        let mut grid = ParamGrid::new();
        grid.insert("alpha".into(), vec![]);
        assert!(expand_grid(&grid).is_err());
    }

    #[test]
    fn grids_deserialize_from_json() {
        let grid: ParamGrid =
            serde_json::from_str(r#"{"max_depth": [3, null], "weights": ["uniform"]}"#).unwrap();
        assert_eq!(grid["max_depth"], vec![ParamValue::Int(3), ParamValue::None]);
        assert_eq!(grid["weights"][0].as_str("weights").unwrap(), "uniform");
    }

    #[test]
    fn typed_accessors_reject_wrong_kinds() {
        assert_eq!(ParamValue::Int(3).as_f64("alpha").unwrap(), 3.0);
        assert!(ParamValue::Float(0.5).as_usize("n").is_err());
        assert!(ParamValue::Int(-1).as_usize("n").is_err());
        assert_eq!(ParamValue::None.as_opt_usize("max_depth").unwrap(), None);
    }
}
