//! Experiment and tuning runs
//!
//! Both paths load the training table, split off the target and cross-validate.
//! An experiment run also writes the fold-0 snapshot and appends one record to
//! the log; a tuning run keeps only its best trial.

use std::path::PathBuf;
use tracing::info;

use crate::config::PipelineConfig;
use crate::cv::{CrossValidator, CvResult};
use crate::experiment::{append_record, ExperimentRecord};
use crate::hpo::{
    boosting_objective, gradient_boosting_space, SamplerKind, SearchDriver, SearchOutcome,
};
use crate::model::EstimatorPreset;
use crate::schema::FeatureTable;
use crate::snapshot::SnapshotStore;
use crate::storage::{get_features_and_labels, load_data};
use crate::{Error, Result};

/// What one experiment run produced
#[derive(Debug, Clone)]
pub struct ExperimentOutcome {
    /// Cross-validation result
    pub cv: CvResult,
    /// Fold-0 snapshot file
    pub snapshot: PathBuf,
    /// Record appended to the log
    pub record: ExperimentRecord,
}

/// Parameters of an experiment run
#[derive(Debug, Clone)]
pub struct ExperimentRequest {
    /// Estimator to evaluate
    pub preset: EstimatorPreset,
    /// Experiment number used for the snapshot name and log header
    pub number: u32,
    /// Log description
    pub description: String,
    /// Fit folds in parallel
    pub parallel: bool,
}

fn training_set(config: &PipelineConfig) -> Result<(FeatureTable, Vec<f64>)> {
    let (train, _test) = load_data(&config.data)?;
    get_features_and_labels(&train, &config.target_column)
}

/// Cross-validate, snapshot fold 0, and append the record to the log.
///
/// # Errors
///
/// Returns [`Error::LogFileMissing`] before any training if the log does not
/// exist, and any load, evaluation, or write error.
pub fn run_experiment(
    config: &PipelineConfig,
    request: &ExperimentRequest,
) -> Result<ExperimentOutcome> {
    if !config.experiment_log.is_file() {
        return Err(Error::LogFileMissing(config.experiment_log.clone()));
    }
    let (x, y) = training_set(config)?;
    let estimator = request.preset.build();

    let cv = CrossValidator::new(config.experiment_folds, config.seed)?
        .with_parallel(request.parallel);
    let store = SnapshotStore::new(&config.models_dir);
    let (result, snapshot) = cv.evaluate_and_persist(&estimator, &x, &y, &store, request.number)?;

    let record =
        ExperimentRecord::from_cv(request.number, &request.description, &result, &estimator);
    append_record(&config.experiment_log, &record)?;
    info!(
        number = request.number,
        estimator = estimator.name(),
        mean_score = result.mean_score,
        "experiment logged"
    );

    Ok(ExperimentOutcome {
        cv: result,
        snapshot,
        record,
    })
}

/// Search the gradient boosting space.
///
/// # Errors
///
/// Returns any load error, [`Error::InvalidInput`] for a zero budget, or the
/// first failing trial's error.
pub fn run_tuning(
    config: &PipelineConfig,
    sampler: SamplerKind,
    n_trials: usize,
) -> Result<SearchOutcome> {
    let (x, y) = training_set(config)?;
    let cv = CrossValidator::new(config.tuning_folds, config.seed)?;
    let driver = SearchDriver::new(gradient_boosting_space(), sampler, config.seed);

    info!(%sampler, n_trials, folds = config.tuning_folds, "tuning started");
    driver.search(boosting_objective(&x, &y, &cv, config.seed), n_trials)
}
