//! Decision tree regressor (CART, squared-error criterion)

use anyhow::{Result, bail};
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{ParamValue, Regressor, check_fit_input, check_predict_input, unknown_param};

/// Decision tree node, stored in a flat arena with the root at index 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node: rows with `x[feature_idx] <= threshold` go to `left`
    Split {
        feature_idx: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
    },
}

impl TreeNode {
    pub fn n_samples(&self) -> usize {
        match *self {
            TreeNode::Leaf { n_samples, .. } | TreeNode::Split { n_samples, .. } => n_samples,
        }
    }
}

fn predict_row(nodes: &[TreeNode], row: ArrayView1<f64>) -> f64 {
    let mut idx = 0;
    loop {
        match nodes[idx] {
            TreeNode::Leaf { value, .. } => return value,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                idx = if row[feature_idx] <= threshold { left } else { right };
            }
        }
    }
}

/// Depth of the tree stored in `nodes`; a lone leaf has depth 0.
pub fn tree_depth(nodes: &[TreeNode]) -> usize {
    let mut deepest = 0;
    let mut stack = vec![(0usize, 0usize)];
    while let Some((idx, depth)) = stack.pop() {
        match nodes.get(idx) {
            Some(TreeNode::Split { left, right, .. }) => {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
            Some(TreeNode::Leaf { .. }) => deepest = deepest.max(depth),
            None => {}
        }
    }
    deepest
}

/// How many features each split may look at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
    Count(usize),
    Fraction(f64),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Count(c) => c,
            MaxFeatures::Fraction(f) => (f * n_features as f64) as usize,
        };
        n.clamp(1, n_features.max(1))
    }

    pub fn from_param(name: &str, value: &ParamValue) -> Result<Self> {
        Ok(match value {
            ParamValue::None => MaxFeatures::All,
            ParamValue::Int(_) => MaxFeatures::Count(value.as_usize(name)?),
            ParamValue::Float(f) if *f > 0.0 && *f <= 1.0 => MaxFeatures::Fraction(*f),
            ParamValue::Str(s) if s == "sqrt" => MaxFeatures::Sqrt,
            ParamValue::Str(s) if s == "log2" => MaxFeatures::Log2,
            other => bail!("invalid {name}: {other}"),
        })
    }
}

/// Growth limits shared by single trees and ensembles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
        }
    }
}

impl TreeParams {
    /// Handle the tree-growth parameters; `Ok(false)` if `name` is not one.
    pub(crate) fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<bool> {
        match name {
            "max_depth" => self.max_depth = value.as_opt_usize(name)?,
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?,
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?,
            "max_features" => self.max_features = MaxFeatures::from_param(name, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn validate(&self) -> Result<()> {
        if self.min_samples_split < 2 {
            bail!("min_samples_split must be >= 2, got {}", self.min_samples_split);
        }
        if self.min_samples_leaf < 1 {
            bail!("min_samples_leaf must be >= 1, got {}", self.min_samples_leaf);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tree growth
// ---------------------------------------------------------------------------

struct Builder<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    params: &'a TreeParams,
    n_try: usize,
    rng: ChaCha8Rng,
}

impl Builder<'_> {
    /// Grow the tree from an explicit work stack; depth is limited by the
    /// data, not the call stack.
    fn build(&mut self, n_rows: usize) -> Vec<TreeNode> {
        let placeholder = TreeNode::Leaf { value: 0.0, n_samples: 0 };
        let mut nodes = vec![placeholder.clone()];
        let mut pending = vec![(0usize, (0..n_rows).collect::<Vec<usize>>(), 0usize)];

        while let Some((slot, indices, depth)) = pending.pop() {
            let n_samples = indices.len();
            let sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
            let node = match self.split_for(&indices, depth, sum) {
                None => TreeNode::Leaf {
                    value: sum / n_samples as f64,
                    n_samples,
                },
                Some((feature_idx, threshold)) => {
                    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                        .into_iter()
                        .partition(|&i| self.x[[i, feature_idx]] <= threshold);
                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(placeholder.clone());
                    nodes.push(placeholder.clone());
                    pending.push((right, right_idx, depth + 1));
                    pending.push((left, left_idx, depth + 1));
                    TreeNode::Split { feature_idx, threshold, left, right, n_samples }
                }
            };
            nodes[slot] = node;
        }
        nodes
    }

    fn split_for(&mut self, indices: &[usize], depth: usize, sum: f64) -> Option<(usize, f64)> {
        let n_samples = indices.len();
        let first = self.y[indices[0]];
        let should_stop = n_samples < self.params.min_samples_split
            || n_samples < 2 * self.params.min_samples_leaf
            || self.params.max_depth.is_some_and(|d| depth >= d)
            || indices.iter().all(|&i| self.y[i] == first);
        if should_stop {
            return None;
        }
        self.best_split(indices, sum)
    }

    /// Best `(feature, threshold)` by squared-error reduction, if any split
    /// improves on the parent.
    ///
    /// Minimising child SSE is the same as maximising
    /// `sum_l² / n_l + sum_r² / n_r`, which needs only running sums.
    fn best_split(&mut self, indices: &[usize], total: f64) -> Option<(usize, f64)> {
        let n = indices.len();
        let n_features = self.x.ncols();
        let features: Vec<usize> = if self.n_try < n_features {
            rand::seq::index::sample(&mut self.rng, n_features, self.n_try).into_vec()
        } else {
            (0..n_features).collect()
        };

        let parent = total * total / n as f64;
        let min_leaf = self.params.min_samples_leaf;
        let mut best: Option<(usize, f64, f64)> = None;
        let mut order = indices.to_vec();

        for feature in features {
            order.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));
            let mut left_sum = 0.0;
            for pos in 0..n - 1 {
                left_sum += self.y[order[pos]];
                let n_left = pos + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let here = self.x[[order[pos], feature]];
                let next = self.x[[order[pos + 1], feature]];
                if next <= here {
                    continue;
                }
                let right_sum = total - left_sum;
                let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
                if best.map_or(true, |(_, _, s)| score > s) {
                    let mut threshold = here + (next - here) / 2.0;
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some((feature, threshold, score));
                }
            }
        }

        let tolerance = 1e-12 * parent.abs().max(1.0);
        best.filter(|&(_, _, score)| score > parent + tolerance)
            .map(|(feature, threshold, _)| (feature, threshold))
    }
}

// ---------------------------------------------------------------------------
// DecisionTreeRegressor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    pub params: TreeParams,
    /// Seed for feature subsampling when `max_features` < all.
    pub random_state: u64,
    nodes: Vec<TreeNode>,
    n_features: usize,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self {
            params: TreeParams::default(),
            random_state: 42,
            nodes: Vec::new(),
            n_features: 0,
        }
    }
}

impl DecisionTreeRegressor {
    pub fn new(params: TreeParams, random_state: u64) -> Self {
        Self {
            params,
            random_state,
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.params.max_depth = Some(depth);
        self
    }

    /// Fitted nodes, root first; empty before `fit`.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Depth of the fitted tree.
    pub fn depth(&self) -> Option<usize> {
        self.is_fitted().then(|| tree_depth(&self.nodes))
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.params.validate()?;

        let mut builder = Builder {
            x,
            y,
            params: &self.params,
            n_try: self.params.max_features.resolve(x.ncols()),
            rng: ChaCha8Rng::seed_from_u64(self.random_state),
        };
        let nodes = builder.build(x.nrows());

        self.n_features = x.ncols();
        self.nodes = nodes;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            bail!("model is not fitted");
        }
        check_predict_input(x, self.n_features)?;
        Ok(x.outer_iter().map(|row| predict_row(&self.nodes, row)).collect())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        if self.params.set_param(name, value)? {
            return Ok(());
        }
        match name {
            "random_state" => self.random_state = value.as_usize(name)? as u64,
            "criterion" => {
                let criterion = value.as_str(name)?;
                if criterion != "squared_error" {
                    bail!("unsupported criterion '{criterion}', only 'squared_error' is available");
                }
            }
            _ => return Err(unknown_param("DecisionTreeRegressor", name)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }
}
