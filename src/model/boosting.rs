//! Gradient-boosted regression trees
//!
//! Leaf-wise (best-first) growth over histogram bins, squared-error loss.
//! Leaf outputs use L1 soft-thresholding and L2 shrinkage of the gradient sum:
//!
//! ```text
//! w = -sign(G) * max(|G| - λ1, 0) / (H + λ2)
//! gain = T(G_L)² / (H_L + λ2) + T(G_R)² / (H_R + λ2) - T(G)² / (H + λ2)
//! ```
//!
//! With squared error every hessian is 1, so `H` is the row count of the node.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_SEED;
use crate::{Error, Result};

/// Boosting hyperparameters (LightGBM naming)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    /// Number of boosting rounds
    pub num_trees: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    /// Depth limit; `None` for unlimited
    pub max_depth: Option<usize>,
    /// Maximum leaves per tree
    pub num_leaves: usize,
    /// L1 regularisation on leaf outputs
    pub lambda_l1: f64,
    /// L2 regularisation on leaf outputs
    pub lambda_l2: f64,
    /// Minimum rows per leaf
    pub min_data_in_leaf: usize,
    /// Fraction of features available to each tree
    pub colsample_bytree: f64,
    /// Fraction of the tree's features available at each node
    pub colsample_bynode: f64,
    /// Fraction of rows drawn at each bagging round
    pub bagging_fraction: f64,
    /// Redraw rows every `bagging_freq` trees; 0 disables bagging
    pub bagging_freq: usize,
    /// Maximum histogram bins per feature
    pub max_bin: usize,
    /// Seed for row and feature subsampling
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            num_trees: 100,
            learning_rate: 0.1,
            max_depth: None,
            num_leaves: 31,
            lambda_l1: 0.0,
            lambda_l2: 0.0,
            min_data_in_leaf: 20,
            colsample_bytree: 1.0,
            colsample_bynode: 1.0,
            bagging_fraction: 1.0,
            bagging_freq: 0,
            max_bin: 255,
            seed: DEFAULT_SEED,
        }
    }
}

impl BoostingParams {
    /// Configuration found by the 50-trial search over the training set.
    #[must_use]
    pub fn tuned() -> Self {
        Self {
            num_trees: 200,
            learning_rate: 0.098_544_206_980_683_74,
            max_depth: Some(8),
            num_leaves: 250,
            lambda_l1: 6.336_661_658_433_877,
            lambda_l2: 5.713_800_450_906_738,
            min_data_in_leaf: 77,
            colsample_bytree: 0.670_750_939_608_245,
            colsample_bynode: 0.868_567_116_334_902_8,
            bagging_fraction: 0.898_625_393_988_604_2,
            bagging_freq: 5,
            ..Self::default()
        }
    }

    /// Check ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first out-of-range parameter.
    pub fn validate(&self) -> Result<()> {
        let fraction = |name: &str, v: f64| {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(Error::InvalidInput(format!("{name} must be in (0, 1], got {v}")))
            }
        };
        if self.num_trees == 0 {
            return Err(Error::InvalidInput("num_trees must be positive".to_string()));
        }
        if self.learning_rate <= 0.0 {
            return Err(Error::InvalidInput("learning_rate must be positive".to_string()));
        }
        if self.num_leaves < 2 {
            return Err(Error::InvalidInput("num_leaves must be at least 2".to_string()));
        }
        if self.max_bin < 2 {
            return Err(Error::InvalidInput("max_bin must be at least 2".to_string()));
        }
        if self.lambda_l1 < 0.0 || self.lambda_l2 < 0.0 {
            return Err(Error::InvalidInput("lambda terms must be non-negative".to_string()));
        }
        fraction("colsample_bytree", self.colsample_bytree)?;
        fraction("colsample_bynode", self.colsample_bynode)?;
        fraction("bagging_fraction", self.bagging_fraction)
    }
}

/// Tree node; children are indices into the owning tree's node list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Raw (unshrunk) output for one row.
    #[must_use]
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// Fitted gradient-boosted ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    init_score: f64,
    learning_rate: f64,
    trees: Vec<Tree>,
}

impl GradientBoostingRegressor {
    /// Fit on a row-major design matrix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for invalid parameters or mismatched
    /// shapes, [`Error::EmptyDataset`] for zero rows.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &BoostingParams) -> Result<Self> {
        params.validate()?;
        if x.is_empty() {
            return Err(Error::EmptyDataset);
        }
        if x.len() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} rows but {} targets",
                x.len(),
                y.len()
            )));
        }

        let n_rows = x.len();
        let n_features = x[0].len();
        let bins = Histogram::build(x, params.max_bin);
        let mut rng = StdRng::seed_from_u64(params.seed);

        #[allow(clippy::cast_precision_loss)]
        let init_score = y.iter().sum::<f64>() / n_rows as f64;
        let mut pred = vec![init_score; n_rows];
        let mut rows: Vec<usize> = (0..n_rows).collect();
        let mut trees = Vec::with_capacity(params.num_trees);

        for t in 0..params.num_trees {
            let bagging = params.bagging_freq > 0 && params.bagging_fraction < 1.0;
            if bagging && t % params.bagging_freq == 0 {
                let amount = fraction_of(n_rows, params.bagging_fraction);
                rows = index::sample(&mut rng, n_rows, amount).into_vec();
                rows.sort_unstable();
            }

            let grad: Vec<f64> = pred.iter().zip(y).map(|(p, target)| p - target).collect();
            let tree_features = sample_sorted(&mut rng, n_features, params.colsample_bytree);

            let tree = TreeBuilder {
                bins: &bins,
                grad: &grad,
                params,
            }
            .grow(rows.clone(), &tree_features, &mut rng);

            for (p, row) in pred.iter_mut().zip(x) {
                *p += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        Ok(Self {
            init_score,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    /// Predict one row.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.init_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    /// Predict every row.
    #[must_use]
    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Baseline prediction (training target mean).
    #[must_use]
    pub const fn init_score(&self) -> f64 {
        self.init_score
    }
}

/// Per-feature cut points and the binned training matrix (column-major)
struct Histogram {
    cuts: Vec<Vec<f64>>,
    binned: Vec<Vec<usize>>,
}

impl Histogram {
    fn build(x: &[Vec<f64>], max_bin: usize) -> Self {
        let n_features = x[0].len();
        let mut cuts = Vec::with_capacity(n_features);
        let mut binned = Vec::with_capacity(n_features);

        for f in 0..n_features {
            let mut values: Vec<f64> = x.iter().map(|r| r[f]).collect();
            values.sort_by(f64::total_cmp);
            values.dedup();

            let feature_cuts: Vec<f64> = if values.len() <= max_bin {
                values.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
            } else {
                let mut q: Vec<f64> = (1..max_bin)
                    .map(|b| values[b * values.len() / max_bin])
                    .collect();
                q.dedup();
                q
            };

            binned.push(
                x.iter()
                    .map(|r| feature_cuts.partition_point(|c| *c < r[f]))
                    .collect(),
            );
            cuts.push(feature_cuts);
        }

        Self { cuts, binned }
    }

    fn n_bins(&self, feature: usize) -> usize {
        self.cuts[feature].len() + 1
    }
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct Candidate {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
    sum_grad: f64,
    split: Option<Split>,
}

struct TreeBuilder<'a> {
    bins: &'a Histogram,
    grad: &'a [f64],
    params: &'a BoostingParams,
}

impl TreeBuilder<'_> {
    fn grow(&self, rows: Vec<usize>, features: &[usize], rng: &mut StdRng) -> Tree {
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let sum_grad = rows.iter().map(|&i| self.grad[i]).sum();
        let mut root = Candidate {
            node: 0,
            rows,
            depth: 0,
            sum_grad,
            split: None,
        };
        root.split = self.best_split(&root, features, rng);
        let mut leaves = vec![root];

        while leaves.len() < self.params.num_leaves {
            let best = leaves
                .iter()
                .enumerate()
                .filter_map(|(i, c)| c.split.map(|s| (i, s)))
                .max_by(|a, b| a.1.gain.total_cmp(&b.1.gain));
            let Some((idx, split)) = best else { break };

            let parent = leaves.swap_remove(idx);
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = parent
                .rows
                .iter()
                .partition(|&&i| self.bins.binned[split.feature][i] <= split.bin);

            let left = nodes.len();
            nodes.push(Node::Leaf { value: 0.0 });
            nodes.push(Node::Leaf { value: 0.0 });
            nodes[parent.node] = Node::Split {
                feature: split.feature,
                threshold: self.bins.cuts[split.feature][split.bin],
                left,
                right: left + 1,
            };

            for (node, child_rows) in [(left, left_rows), (left + 1, right_rows)] {
                let sum_grad = child_rows.iter().map(|&i| self.grad[i]).sum();
                let mut child = Candidate {
                    node,
                    rows: child_rows,
                    depth: parent.depth + 1,
                    sum_grad,
                    split: None,
                };
                child.split = self.best_split(&child, features, rng);
                leaves.push(child);
            }
        }

        for leaf in &leaves {
            #[allow(clippy::cast_precision_loss)]
            let hess = leaf.rows.len() as f64;
            nodes[leaf.node] = Node::Leaf {
                value: -soft_threshold(leaf.sum_grad, self.params.lambda_l1)
                    / (hess + self.params.lambda_l2).max(f64::EPSILON),
            };
        }

        Tree { nodes }
    }

    fn best_split(
        &self,
        candidate: &Candidate,
        tree_features: &[usize],
        rng: &mut StdRng,
    ) -> Option<Split> {
        if self
            .params
            .max_depth
            .is_some_and(|d| candidate.depth >= d)
        {
            return None;
        }
        let min_leaf = self.params.min_data_in_leaf.max(1);
        if candidate.rows.len() < 2 * min_leaf {
            return None;
        }

        let node_features: Vec<usize> =
            sample_sorted(rng, tree_features.len(), self.params.colsample_bynode)
                .into_iter()
                .map(|i| tree_features[i])
                .collect();

        #[allow(clippy::cast_precision_loss)]
        let total_n = candidate.rows.len() as f64;
        let parent_score = self.score(candidate.sum_grad, total_n);
        let mut best: Option<Split> = None;

        for feature in node_features {
            let n_bins = self.bins.n_bins(feature);
            let mut grad_hist = vec![0.0; n_bins];
            let mut count_hist = vec![0usize; n_bins];
            for &i in &candidate.rows {
                let b = self.bins.binned[feature][i];
                grad_hist[b] += self.grad[i];
                count_hist[b] += 1;
            }

            let mut left_grad = 0.0;
            let mut left_count = 0usize;
            for bin in 0..n_bins - 1 {
                left_grad += grad_hist[bin];
                left_count += count_hist[bin];
                let right_count = candidate.rows.len() - left_count;
                if left_count < min_leaf || right_count < min_leaf {
                    continue;
                }
                #[allow(clippy::cast_precision_loss)]
                let gain = self.score(left_grad, left_count as f64)
                    + self.score(candidate.sum_grad - left_grad, right_count as f64)
                    - parent_score;
                if gain > 0.0 && best.map_or(true, |s| gain > s.gain) {
                    best = Some(Split { feature, bin, gain });
                }
            }
        }
        best
    }

    fn score(&self, sum_grad: f64, hess: f64) -> f64 {
        soft_threshold(sum_grad, self.params.lambda_l1).powi(2)
            / (hess + self.params.lambda_l2).max(f64::EPSILON)
    }
}

fn soft_threshold(g: f64, l1: f64) -> f64 {
    g.signum() * (g.abs() - l1).max(0.0)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn fraction_of(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction).ceil() as usize).clamp(1, n)
}

/// Sorted subset of `0..n` of size `ceil(fraction * n)`.
fn sample_sorted(rng: &mut StdRng, n: usize, fraction: f64) -> Vec<usize> {
    if fraction >= 1.0 || n <= 1 {
        return (0..n).collect();
    }
    let mut picked = index::sample(rng, n, fraction_of(n, fraction)).into_vec();
    picked.sort_unstable();
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![f64::from(i) / 40.0, 1.0]).collect();
        let y = x.iter().map(|r| if r[0] > 0.5 { 10.0 } else { 0.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_tuned_params_validate() {
        assert!(BoostingParams::tuned().validate().is_ok());
        assert!(BoostingParams::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_fraction() {
        let params = BoostingParams {
            bagging_fraction: 0.0,
            ..BoostingParams::default()
        };
        assert!(matches!(params.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_learns_step_function() {
        let (x, y) = step_data();
        let params = BoostingParams {
            num_trees: 50,
            min_data_in_leaf: 2,
            ..BoostingParams::default()
        };
        let model = GradientBoostingRegressor::fit(&x, &y, &params).unwrap();

        assert!(model.predict_row(&[0.1, 1.0]) < 1.0);
        assert!(model.predict_row(&[0.9, 1.0]) > 9.0);
    }

    #[test]
    fn test_num_leaves_caps_tree_size() {
        let (x, y) = step_data();
        let params = BoostingParams {
            num_trees: 5,
            num_leaves: 2,
            min_data_in_leaf: 1,
            ..BoostingParams::default()
        };
        let model = GradientBoostingRegressor::fit(&x, &y, &params).unwrap();
        assert!(model.trees().iter().all(|t| t.n_leaves() <= 2));
    }

    #[test]
    fn test_large_l1_keeps_baseline() {
        let (x, y) = step_data();
        let params = BoostingParams {
            num_trees: 3,
            lambda_l1: 1e9,
            min_data_in_leaf: 1,
            ..BoostingParams::default()
        };
        let model = GradientBoostingRegressor::fit(&x, &y, &params).unwrap();
        assert!((model.predict_row(&[0.9, 1.0]) - model.init_score()).abs() < 1e-12);
    }

    #[test]
    fn test_seeded_subsampling_is_deterministic() {
        let (x, y) = step_data();
        let params = BoostingParams {
            num_trees: 10,
            min_data_in_leaf: 2,
            bagging_fraction: 0.5,
            bagging_freq: 1,
            colsample_bytree: 0.5,
            ..BoostingParams::default()
        };
        let a = GradientBoostingRegressor::fit(&x, &y, &params).unwrap();
        let b = GradientBoostingRegressor::fit(&x, &y, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fit_empty() {
        let err = GradientBoostingRegressor::fit(&[], &[], &BoostingParams::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyDataset));
    }
}
