//! K-fold cross-validation
//!
//! Rows are shuffled once with a fixed seed and cut into `k` contiguous
//! validation folds; the first `n % k` folds take one extra row. Every fold
//! fits a fresh model from the estimator template on the other `k - 1` folds
//! and scores RMSE on its own rows.
//!
//! Only the fold-0 model survives an evaluation: [`CrossValidator::evaluate_and_persist`]
//! writes it as the experiment's snapshot and the other fold models are
//! dropped once scored.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{DEFAULT_SEED, EXPERIMENT_FOLDS};
use crate::model::{Estimator, FittedModel};
use crate::schema::FeatureTable;
use crate::snapshot::SnapshotStore;
use crate::{Error, Result};

/// Shuffled k-fold index splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    n_splits: usize,
    seed: u64,
}

impl KFold {
    /// Splitter producing `n_splits` folds from a `seed`-shuffled permutation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `n_splits < 2`.
    pub fn new(n_splits: usize, seed: u64) -> Result<Self> {
        if n_splits < 2 {
            return Err(Error::InvalidInput(format!(
                "k-fold needs at least 2 splits, got {n_splits}"
            )));
        }
        Ok(Self { n_splits, seed })
    }

    /// Number of folds.
    #[must_use]
    pub const fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Validation indices of every fold over `n_rows` rows.
    ///
    /// The folds are pairwise disjoint and their union is `0..n_rows`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDataset`] for zero rows and
    /// [`Error::FoldCountError`] when there are fewer rows than folds.
    pub fn split(&self, n_rows: usize) -> Result<Vec<Vec<usize>>> {
        if n_rows == 0 {
            return Err(Error::EmptyDataset);
        }
        if self.n_splits > n_rows {
            return Err(Error::FoldCountError {
                folds: self.n_splits,
                rows: n_rows,
            });
        }

        let mut indices: Vec<usize> = (0..n_rows).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(self.seed));

        let base = n_rows / self.n_splits;
        let extra = n_rows % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for fold in 0..self.n_splits {
            let size = base + usize::from(fold < extra);
            folds.push(indices[start..start + size].to_vec());
            start += size;
        }
        Ok(folds)
    }
}

/// Held-out score of one fold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoldResult {
    /// Fold index
    pub fold: usize,
    /// Validation RMSE
    pub score: f64,
}

/// Aggregated cross-validation outcome
#[derive(Debug, Clone, PartialEq)]
pub struct CvResult {
    /// Per-fold scores, ordered by fold index
    pub fold_results: Vec<FoldResult>,
    /// Arithmetic mean of fold scores
    pub mean_score: f64,
    /// Wall-clock seconds for the whole loop, rounded to 2 decimals
    pub duration_secs: f64,
    /// Prediction for every row from the fold that held it out
    pub oof_predictions: Vec<f64>,
}

/// Root-mean-squared error.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] on empty or mismatched inputs.
pub fn rmse(predictions: &[f64], targets: &[f64]) -> Result<f64> {
    if predictions.is_empty() || predictions.len() != targets.len() {
        return Err(Error::InvalidInput(format!(
            "rmse over {} predictions and {} targets",
            predictions.len(),
            targets.len()
        )));
    }
    let sse: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let mse = sse / predictions.len() as f64;
    Ok(mse.sqrt())
}

struct FoldOutcome {
    result: FoldResult,
    validation: Vec<usize>,
    predictions: Vec<f64>,
    model: Option<FittedModel>,
}

/// Runs k-fold evaluation of an [`Estimator`]
#[derive(Debug, Clone)]
pub struct CrossValidator {
    kfold: KFold,
    parallel: bool,
}

impl Default for CrossValidator {
    fn default() -> Self {
        Self {
            kfold: KFold {
                n_splits: EXPERIMENT_FOLDS,
                seed: DEFAULT_SEED,
            },
            parallel: false,
        }
    }
}

impl CrossValidator {
    /// Sequential validator over `folds` folds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `folds < 2`.
    pub fn new(folds: usize, seed: u64) -> Result<Self> {
        Ok(Self {
            kfold: KFold::new(folds, seed)?,
            parallel: false,
        })
    }

    /// Evaluate folds on the rayon pool. Results are still ordered by fold.
    /// Without the `parallel` feature this is a no-op.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// The fold splitter.
    #[must_use]
    pub const fn kfold(&self) -> &KFold {
        &self.kfold
    }

    /// Cross-validate `estimator` on `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDataset`], [`Error::FoldCountError`], or the first
    /// estimator failure unchanged.
    pub fn evaluate(&self, estimator: &Estimator, x: &FeatureTable, y: &[f64]) -> Result<CvResult> {
        self.run(estimator, x, y).map(|(result, _)| result)
    }

    /// Cross-validate and write the fold-0 model to `store` under `experiment`.
    ///
    /// Returns the result and the snapshot path.
    ///
    /// # Errors
    ///
    /// As [`CrossValidator::evaluate`], plus snapshot write failures.
    pub fn evaluate_and_persist(
        &self,
        estimator: &Estimator,
        x: &FeatureTable,
        y: &[f64],
        store: &SnapshotStore,
        experiment: u32,
    ) -> Result<(CvResult, PathBuf)> {
        let (result, first_model) = self.run(estimator, x, y)?;
        let model = first_model
            .ok_or_else(|| Error::Estimator("fold 0 produced no model".to_string()))?;
        let path = store.save(&model, experiment, 0)?;
        Ok((result, path))
    }

    fn run(
        &self,
        estimator: &Estimator,
        x: &FeatureTable,
        y: &[f64],
    ) -> Result<(CvResult, Option<FittedModel>)> {
        if x.len() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        let start = Instant::now();
        let folds = self.kfold.split(x.len())?;
        info!(
            estimator = estimator.name(),
            rows = x.len(),
            folds = folds.len(),
            parallel = self.parallel,
            "cross-validation started"
        );

        let mut outcomes = self.run_folds(estimator, x, y, &folds)?;
        outcomes.sort_by_key(|o| o.result.fold);

        let mut oof_predictions = vec![0.0; x.len()];
        let mut fold_results = Vec::with_capacity(outcomes.len());
        let mut first_model = None;
        for outcome in outcomes {
            for (&row, &p) in outcome.validation.iter().zip(&outcome.predictions) {
                oof_predictions[row] = p;
            }
            if outcome.model.is_some() {
                first_model = outcome.model;
            }
            fold_results.push(outcome.result);
        }

        #[allow(clippy::cast_precision_loss)]
        let mean_score =
            fold_results.iter().map(|f| f.score).sum::<f64>() / fold_results.len() as f64;
        let duration_secs = (start.elapsed().as_secs_f64() * 100.0).round() / 100.0;

        info!(
            estimator = estimator.name(),
            mean_score,
            duration_secs,
            "cross-validation finished"
        );
        Ok((
            CvResult {
                fold_results,
                mean_score,
                duration_secs,
                oof_predictions,
            },
            first_model,
        ))
    }

    #[cfg(feature = "parallel")]
    fn run_folds(
        &self,
        estimator: &Estimator,
        x: &FeatureTable,
        y: &[f64],
        folds: &[Vec<usize>],
    ) -> Result<Vec<FoldOutcome>> {
        use rayon::prelude::*;

        if self.parallel {
            (0..folds.len())
                .into_par_iter()
                .map(|fold| fit_fold(estimator, x, y, folds, fold))
                .collect()
        } else {
            (0..folds.len())
                .map(|fold| fit_fold(estimator, x, y, folds, fold))
                .collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn run_folds(
        &self,
        estimator: &Estimator,
        x: &FeatureTable,
        y: &[f64],
        folds: &[Vec<usize>],
    ) -> Result<Vec<FoldOutcome>> {
        (0..folds.len())
            .map(|fold| fit_fold(estimator, x, y, folds, fold))
            .collect()
    }
}

fn fit_fold(
    estimator: &Estimator,
    x: &FeatureTable,
    y: &[f64],
    folds: &[Vec<usize>],
    fold: usize,
) -> Result<FoldOutcome> {
    let validation = folds[fold].clone();
    let train: Vec<usize> = folds
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != fold)
        .flat_map(|(_, rows)| rows.iter().copied())
        .collect();

    let y_train: Vec<f64> = train.iter().map(|&i| y[i]).collect();
    let y_valid: Vec<f64> = validation.iter().map(|&i| y[i]).collect();

    let model = estimator.fit(&x.select(&train), &y_train)?;
    let predictions = model.predict(&x.select(&validation))?;
    let score = rmse(&predictions, &y_valid)?;

    debug!(fold, train = train.len(), valid = validation.len(), "fold fitted");
    info!(estimator = estimator.name(), fold, score, "fold scored");

    Ok(FoldOutcome {
        result: FoldResult { fold, score },
        validation,
        predictions,
        model: (fold == 0).then_some(model),
    })
}
