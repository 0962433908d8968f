//! Hyperparameter search
//!
//! A fixed trial budget is spent sampling configurations from a
//! [`HyperparameterSpace`] and scoring each with a caller-supplied objective
//! (lower is better). There is no early stopping. Only the best trial is
//! returned; the history lives for the duration of the search, since TPE
//! samples from it.
//!
//! # Example
//!
//! ```rust
//! use exam_score::hpo::{HyperparameterSpace, ParameterDomain, SamplerKind, SearchDriver};
//!
//! let mut space = HyperparameterSpace::new();
//! space.add("x", ParameterDomain::Continuous { low: -1.0, high: 1.0, log_scale: false })?;
//!
//! let outcome = SearchDriver::new(space, SamplerKind::Random, 303)
//!     .search(|p| Ok(p["x"].as_float().powi(2)), 20)?;
//! assert!(outcome.best_score < 0.25);
//! # Ok::<(), exam_score::Error>(())
//! ```

mod sampler;
mod space;

pub use sampler::{SamplerKind, TpeSampler, Trial};
pub use space::{
    boosting_params_from, gradient_boosting_space, HyperparameterSpace, ParamSet,
    ParameterDomain, ParameterValue, TUNING_NUM_TREES,
};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::cv::CrossValidator;
use crate::model::{Estimator, EstimatorKind};
use crate::preprocessing::build_preprocessor;
use crate::schema::FeatureTable;
use crate::{Error, Result};

/// Best trial of a finished search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Id of the best trial
    pub best_trial: usize,
    /// Its configuration
    pub best_params: ParamSet,
    /// Its objective value
    pub best_score: f64,
    /// Trials run
    pub n_trials: usize,
}

/// Runs a seeded search over a space
#[derive(Debug, Clone)]
pub struct SearchDriver {
    space: HyperparameterSpace,
    sampler: SamplerKind,
    tpe: TpeSampler,
    seed: u64,
}

impl SearchDriver {
    /// Driver over `space`.
    #[must_use]
    pub fn new(space: HyperparameterSpace, sampler: SamplerKind, seed: u64) -> Self {
        Self {
            space,
            sampler,
            tpe: TpeSampler::default(),
            seed,
        }
    }

    /// Override TPE settings.
    #[must_use]
    pub const fn with_tpe(mut self, tpe: TpeSampler) -> Self {
        self.tpe = tpe;
        self
    }

    /// The search space.
    #[must_use]
    pub const fn space(&self) -> &HyperparameterSpace {
        &self.space
    }

    /// Spend `n_trials` trials minimising `objective`.
    ///
    /// A NaN score never beats a real one. Ties keep the earlier trial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a zero budget or an empty space;
    /// the first objective error aborts the search and is returned unchanged.
    pub fn search<F>(&self, mut objective: F, n_trials: usize) -> Result<SearchOutcome>
    where
        F: FnMut(&ParamSet) -> Result<f64>,
    {
        if n_trials == 0 {
            return Err(Error::InvalidInput("n_trials must be positive".to_string()));
        }
        if self.space.is_empty() {
            return Err(Error::InvalidInput("search space is empty".to_string()));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut history: Vec<Trial> = Vec::with_capacity(n_trials);
        let mut best: Option<usize> = None;

        for id in 0..n_trials {
            let params = match self.sampler {
                SamplerKind::Random => self.space.sample_random(&mut rng),
                SamplerKind::Tpe => self.tpe.suggest(&self.space, &history, &mut rng),
            };
            let raw = objective(&params)?;
            let score = if raw.is_nan() { f64::INFINITY } else { raw };

            let improved = best.map_or(true, |b| score < history[b].score);
            if improved {
                best = Some(id);
            }
            info!(trial = id, score = raw, best = improved, "trial finished");
            history.push(Trial { id, params, score });
        }

        let best = best.unwrap_or(0);
        let trial = &history[best];
        info!(trial = trial.id, score = trial.score, "search finished");
        Ok(SearchOutcome {
            best_trial: trial.id,
            best_params: trial.params.clone(),
            best_score: trial.score,
            n_trials,
        })
    }
}

/// Objective scoring each trial by the mean RMSE of `cv` over gradient
/// boosting built from the trial's parameters.
pub fn boosting_objective<'a>(
    x: &'a FeatureTable,
    y: &'a [f64],
    cv: &'a CrossValidator,
    seed: u64,
) -> impl FnMut(&ParamSet) -> Result<f64> + 'a {
    move |params| {
        let boosting = boosting_params_from(params, seed)?;
        let estimator = Estimator::new(
            "gradient_boosting",
            build_preprocessor(),
            EstimatorKind::GradientBoosting(boosting),
        );
        Ok(cv.evaluate(&estimator, x, y)?.mean_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_space() -> HyperparameterSpace {
        let mut space = HyperparameterSpace::new();
        space
            .add(
                "x",
                ParameterDomain::Continuous {
                    low: -2.0,
                    high: 2.0,
                    log_scale: false,
                },
            )
            .unwrap();
        space
    }

    #[test]
    fn test_zero_trials_rejected() {
        let driver = SearchDriver::new(line_space(), SamplerKind::Tpe, 1);
        let err = driver.search(|_| Ok(0.0), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_empty_space_rejected() {
        let driver = SearchDriver::new(HyperparameterSpace::new(), SamplerKind::Random, 1);
        assert!(driver.search(|_| Ok(0.0), 3).is_err());
    }

    #[test]
    fn test_search_is_seeded() {
        let run = |seed| {
            SearchDriver::new(line_space(), SamplerKind::Tpe, seed)
                .search(|p| Ok((p["x"].as_float() - 0.5).powi(2)), 25)
                .unwrap()
        };
        assert_eq!(run(303), run(303));
    }

    #[test]
    fn test_tpe_finds_minimum() {
        let outcome = SearchDriver::new(line_space(), SamplerKind::Tpe, 303)
            .search(|p| Ok((p["x"].as_float() - 0.5).powi(2)), 40)
            .unwrap();
        assert_eq!(outcome.n_trials, 40);
        assert!(outcome.best_score < 0.05, "best {}", outcome.best_score);
    }

    #[test]
    fn test_objective_error_aborts() {
        let mut calls = 0;
        let err = SearchDriver::new(line_space(), SamplerKind::Random, 0)
            .search(
                |_| {
                    calls += 1;
                    Err(Error::Estimator("boom".to_string()))
                },
                10,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Estimator(_)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_nan_never_beats_real_score() {
        let mut scores = vec![f64::NAN, 3.0].into_iter();
        let outcome = SearchDriver::new(line_space(), SamplerKind::Random, 0)
            .search(|_| Ok(scores.next().unwrap_or(9.0)), 2)
            .unwrap();
        assert_eq!(outcome.best_trial, 1);
    }
}
