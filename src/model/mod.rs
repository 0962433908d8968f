//! Estimators: preprocessing spec + regressor as one fit/predict unit
//!
//! The set of regressors is closed ([`EstimatorKind`]); an [`Estimator`] is an
//! untrained template that can be fitted any number of times, each call
//! producing an independent [`FittedModel`]. Nothing fitted lives on the
//! template, so folds cannot share state.
//!
//! ```text
//! Estimator (template) ──fit──> FittedModel { FittedPreprocessor, FittedRegressor }
//! ```

pub mod boosting;

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{
    LinearRegression, LinearRegressionParameters, LinearRegressionSolverName,
};
use smartcore::linear::ridge_regression::{RidgeRegression, RidgeRegressionParameters};
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::config::DEFAULT_SEED;
use crate::preprocessing::{build_preprocessor, FittedPreprocessor, PreprocessingSpec};
use crate::schema::{FeatureRow, FeatureTable};
use crate::{Error, Result};

pub use boosting::{BoostingParams, GradientBoostingRegressor};

type Matrix = DenseMatrix<f64>;

/// Decision tree settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Depth limit; `None` for unlimited
    pub max_depth: Option<u16>,
    /// Minimum rows per leaf
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_leaf: 1,
        }
    }
}

/// Random forest settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees
    pub n_trees: usize,
    /// Depth limit; `None` for unlimited
    pub max_depth: Option<u16>,
    /// Minimum rows per leaf
    pub min_samples_leaf: usize,
    /// Bootstrap seed
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: None,
            min_samples_leaf: 1,
            seed: DEFAULT_SEED,
        }
    }
}

/// Closed set of regressors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EstimatorKind {
    /// Predicts the training target mean
    MeanBaseline,
    /// Ordinary least squares (SVD solver)
    LinearRegression,
    /// L2-penalised least squares with an unpenalised intercept
    Ridge {
        /// Penalty strength
        alpha: f64,
    },
    /// CART regression tree
    DecisionTree(TreeParams),
    /// Bagged CART trees
    RandomForest(ForestParams),
    /// Leaf-wise gradient-boosted trees
    GradientBoosting(BoostingParams),
}

/// Named estimator configurations selectable from the experiment runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorPreset {
    /// [`EstimatorKind::MeanBaseline`]
    MeanBaseline,
    /// [`EstimatorKind::LinearRegression`]
    LinearRegression,
    /// [`EstimatorKind::Ridge`] with `alpha = 1.0`
    Ridge,
    /// [`EstimatorKind::DecisionTree`] with defaults
    DecisionTree,
    /// [`EstimatorKind::RandomForest`] with 200 trees
    RandomForest,
    /// [`EstimatorKind::GradientBoosting`] with library defaults
    GradientBoosting,
    /// [`EstimatorKind::GradientBoosting`] with [`BoostingParams::tuned`]
    TunedGradientBoosting,
}

impl EstimatorPreset {
    /// Every preset, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::MeanBaseline,
        Self::LinearRegression,
        Self::Ridge,
        Self::DecisionTree,
        Self::RandomForest,
        Self::GradientBoosting,
        Self::TunedGradientBoosting,
    ];

    /// Stable name, used in snapshot file names.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MeanBaseline => "mean_baseline",
            Self::LinearRegression => "linear_regression",
            Self::Ridge => "ridge",
            Self::DecisionTree => "decision_tree",
            Self::RandomForest => "random_forest",
            Self::GradientBoosting => "gradient_boosting",
            Self::TunedGradientBoosting => "tuned_gradient_boosting",
        }
    }

    /// Regressor configuration of the preset.
    #[must_use]
    pub fn kind(self) -> EstimatorKind {
        match self {
            Self::MeanBaseline => EstimatorKind::MeanBaseline,
            Self::LinearRegression => EstimatorKind::LinearRegression,
            Self::Ridge => EstimatorKind::Ridge { alpha: 1.0 },
            Self::DecisionTree => EstimatorKind::DecisionTree(TreeParams::default()),
            Self::RandomForest => EstimatorKind::RandomForest(ForestParams::default()),
            Self::GradientBoosting => EstimatorKind::GradientBoosting(BoostingParams::default()),
            Self::TunedGradientBoosting => {
                EstimatorKind::GradientBoosting(BoostingParams::tuned())
            }
        }
    }

    /// Untrained estimator using the standard preprocessing spec.
    #[must_use]
    pub fn build(self) -> Estimator {
        Estimator::new(self.name(), build_preprocessor(), self.kind())
    }
}

impl fmt::Display for EstimatorPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EstimatorPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|p| p.name() == normalized)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|p| p.name()).collect();
                Error::InvalidInput(format!("unknown estimator '{s}', expected one of {names:?}"))
            })
    }
}

/// Untrained estimator template
#[derive(Debug, Clone, PartialEq)]
pub struct Estimator {
    name: String,
    spec: PreprocessingSpec,
    kind: EstimatorKind,
}

impl Estimator {
    /// Combine a preprocessing spec and a regressor configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, spec: PreprocessingSpec, kind: EstimatorKind) -> Self {
        Self {
            name: name.into(),
            spec,
            kind,
        }
    }

    /// Estimator name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Preprocessing spec.
    #[must_use]
    pub const fn spec(&self) -> &PreprocessingSpec {
        &self.spec
    }

    /// Regressor configuration.
    #[must_use]
    pub const fn kind(&self) -> &EstimatorKind {
        &self.kind
    }

    /// Fit preprocessing then the regressor on `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDataset`] for zero rows, [`Error::InvalidInput`]
    /// when `x` and `y` differ in length, and regressor failures unchanged.
    pub fn fit(&self, x: &FeatureTable, y: &[f64]) -> Result<FittedModel> {
        if x.len() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        let preprocessor = self.spec.fit(x)?;
        let design = preprocessor.transform(x)?;
        debug!(
            estimator = %self.name,
            rows = design.len(),
            features = preprocessor.n_features_out(),
            "fitting regressor"
        );
        let regressor = FittedRegressor::fit(&self.kind, &design, y)?;

        Ok(FittedModel {
            name: self.name.clone(),
            preprocessor,
            regressor,
        })
    }
}

impl fmt::Display for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline(steps=[")?;
        writeln!(f, "('preprocessor', {}),", self.spec)?;
        writeln!(f, "('regressor', {:?}),", self.kind)?;
        write!(f, "])")
    }
}

/// Fitted regressor state
#[derive(Debug, Serialize, Deserialize)]
pub enum FittedRegressor {
    /// Training target mean
    MeanBaseline {
        /// Predicted value
        mean: f64,
    },
    /// smartcore OLS
    LinearRegression(LinearRegression<f64, f64, Matrix, Vec<f64>>),
    /// smartcore ridge fitted on centred data
    Ridge {
        /// Coefficients over centred features
        model: RidgeRegression<f64, f64, Matrix, Vec<f64>>,
        /// Training column means
        x_means: Vec<f64>,
        /// Training target mean, the intercept on centred features
        y_mean: f64,
    },
    /// smartcore CART
    DecisionTree(DecisionTreeRegressor<f64, f64, Matrix, Vec<f64>>),
    /// smartcore random forest
    RandomForest(RandomForestRegressor<f64, f64, Matrix, Vec<f64>>),
    /// In-crate gradient boosting
    GradientBoosting(GradientBoostingRegressor),
}

impl FittedRegressor {
    fn fit(kind: &EstimatorKind, x: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        if x.is_empty() {
            return Err(Error::EmptyDataset);
        }
        let fitted = match kind {
            EstimatorKind::MeanBaseline => Self::MeanBaseline { mean: mean(y) },
            EstimatorKind::LinearRegression => {
                let params = LinearRegressionParameters::default()
                    .with_solver(LinearRegressionSolverName::SVD);
                Self::LinearRegression(LinearRegression::fit(&to_matrix(x), &y.to_vec(), params)?)
            }
            EstimatorKind::Ridge { alpha } => {
                // smartcore only fits an intercept when it also rescales columns,
                // which fails on constant one-hot columns. Centre both sides instead.
                let x_means = column_means(x);
                let y_mean = mean(y);
                let y_centred: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
                let params = RidgeRegressionParameters::default()
                    .with_alpha(*alpha)
                    .with_normalize(false);
                let model = RidgeRegression::fit(&centred(x, &x_means), &y_centred, params)?;
                Self::Ridge {
                    model,
                    x_means,
                    y_mean,
                }
            }
            EstimatorKind::DecisionTree(tree) => {
                let min_leaf = tree
                    .min_samples_leaf
                    .try_into()
                    .map_err(out_of_range("min_samples_leaf"))?;
                let mut params =
                    DecisionTreeRegressorParameters::default().with_min_samples_leaf(min_leaf);
                if let Some(depth) = tree.max_depth {
                    params = params.with_max_depth(depth);
                }
                Self::DecisionTree(DecisionTreeRegressor::fit(&to_matrix(x), &y.to_vec(), params)?)
            }
            EstimatorKind::RandomForest(forest) => {
                let mut params = RandomForestRegressorParameters::default()
                    .with_n_trees(forest.n_trees.try_into().map_err(out_of_range("n_trees"))?)
                    .with_min_samples_leaf(
                        forest.min_samples_leaf.try_into().map_err(out_of_range("min_samples_leaf"))?,
                    )
                    .with_seed(forest.seed);
                if let Some(depth) = forest.max_depth {
                    params = params.with_max_depth(depth);
                }
                Self::RandomForest(RandomForestRegressor::fit(&to_matrix(x), &y.to_vec(), params)?)
            }
            EstimatorKind::GradientBoosting(params) => {
                Self::GradientBoosting(GradientBoostingRegressor::fit(x, y, params)?)
            }
        };
        Ok(fitted)
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        if x.is_empty() {
            return Ok(Vec::new());
        }
        let predictions = match self {
            Self::MeanBaseline { mean } => vec![*mean; x.len()],
            Self::LinearRegression(m) => m.predict(&to_matrix(x))?,
            Self::Ridge {
                model,
                x_means,
                y_mean,
            } => model
                .predict(&centred(x, x_means))?
                .into_iter()
                .map(|p| p + y_mean)
                .collect(),
            Self::DecisionTree(m) => m.predict(&to_matrix(x))?,
            Self::RandomForest(m) => m.predict(&to_matrix(x))?,
            Self::GradientBoosting(m) => m.predict(x),
        };
        Ok(predictions)
    }
}

fn out_of_range<E>(name: &'static str) -> impl FnOnce(E) -> Error {
    move |_| Error::InvalidInput(format!("{name} out of range"))
}

fn to_matrix(x: &[Vec<f64>]) -> Matrix {
    DenseMatrix::from_2d_vec(&x.to_vec())
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[allow(clippy::cast_precision_loss)]
fn column_means(x: &[Vec<f64>]) -> Vec<f64> {
    let width = x.first().map_or(0, Vec::len);
    let mut sums = vec![0.0; width];
    for row in x {
        for (sum, v) in sums.iter_mut().zip(row) {
            *sum += v;
        }
    }
    sums.into_iter().map(|s| s / x.len() as f64).collect()
}

fn centred(x: &[Vec<f64>], means: &[f64]) -> Matrix {
    let rows: Vec<Vec<f64>> = x
        .iter()
        .map(|row| row.iter().zip(means).map(|(v, m)| v - m).collect())
        .collect();
    DenseMatrix::from_2d_vec(&rows)
}

/// Anything that can score a single validated feature row
pub trait Predict: Send + Sync {
    /// Predict the exam score for one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be transformed or the regressor fails.
    fn predict_row(&self, row: &FeatureRow) -> Result<f64>;
}

/// Fitted preprocessor and regressor, read-only after fit
#[derive(Debug, Serialize, Deserialize)]
pub struct FittedModel {
    name: String,
    preprocessor: FittedPreprocessor,
    regressor: FittedRegressor,
}

impl FittedModel {
    /// Name of the estimator that produced the model.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fitted preprocessing state.
    #[must_use]
    pub const fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    /// Fitted regressor state.
    #[must_use]
    pub const fn regressor(&self) -> &FittedRegressor {
        &self.regressor
    }

    /// Predict every row of `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCategory`] for ordinal values outside their
    /// order, or the regressor's failure.
    pub fn predict(&self, x: &FeatureTable) -> Result<Vec<f64>> {
        let design = self.preprocessor.transform(x)?;
        self.regressor.predict(&design)
    }
}

impl Predict for FittedModel {
    fn predict_row(&self, row: &FeatureRow) -> Result<f64> {
        let design = vec![self.preprocessor.transform_row(row)?];
        self.regressor
            .predict(&design)?
            .first()
            .copied()
            .ok_or_else(|| Error::Estimator("regressor returned no prediction".to_string()))
    }
}
