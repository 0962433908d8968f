//! Experiment Record - one evaluated configuration, appended once to the log

use serde::{Deserialize, Serialize};

use crate::cv::CvResult;
use crate::model::Estimator;

/// Experiment Record represents one cross-validated estimator run.
///
/// Records are written to the log once and never mutated; the experiment
/// number is the caller's, not derived from the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentRecord {
    number: u32,
    description: String,
    mean_score: f64,
    duration_secs: f64,
    estimator: String,
}

impl ExperimentRecord {
    /// Create a builder with the required number and description.
    #[must_use]
    pub fn builder(number: u32, description: impl Into<String>) -> ExperimentRecordBuilder {
        ExperimentRecordBuilder::new(number, description)
    }

    /// Record a finished cross-validation of `estimator`.
    #[must_use]
    pub fn from_cv(
        number: u32,
        description: impl Into<String>,
        result: &CvResult,
        estimator: &Estimator,
    ) -> Self {
        Self::builder(number, description)
            .mean_score(result.mean_score)
            .duration_secs(result.duration_secs)
            .estimator(estimator.to_string())
            .build()
    }

    /// Experiment number as given at write time.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Free-text description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Mean CV score.
    #[must_use]
    pub const fn mean_score(&self) -> f64 {
        self.mean_score
    }

    /// Evaluation wall time in seconds.
    #[must_use]
    pub const fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Serialized estimator description.
    #[must_use]
    pub fn estimator(&self) -> &str {
        &self.estimator
    }
}

/// Builder for `ExperimentRecord`.
#[derive(Debug)]
pub struct ExperimentRecordBuilder {
    number: u32,
    description: String,
    mean_score: f64,
    duration_secs: f64,
    estimator: String,
}

impl ExperimentRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(number: u32, description: impl Into<String>) -> Self {
        Self {
            number,
            description: description.into(),
            mean_score: f64::NAN,
            duration_secs: 0.0,
            estimator: String::new(),
        }
    }

    /// Set the mean CV score.
    #[must_use]
    pub const fn mean_score(mut self, mean_score: f64) -> Self {
        self.mean_score = mean_score;
        self
    }

    /// Set the evaluation duration in seconds.
    #[must_use]
    pub const fn duration_secs(mut self, duration_secs: f64) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    /// Set the estimator description.
    #[must_use]
    pub fn estimator(mut self, estimator: impl Into<String>) -> Self {
        self.estimator = estimator.into();
        self
    }

    /// Build the `ExperimentRecord`.
    #[must_use]
    pub fn build(self) -> ExperimentRecord {
        ExperimentRecord {
            number: self.number,
            description: self.description,
            mean_score: self.mean_score,
            duration_secs: self.duration_secs,
            estimator: self.estimator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::FoldResult;
    use crate::model::EstimatorPreset;

    #[test]
    fn test_experiment_record_builder() {
        let record = ExperimentRecord::builder(7, "ridge baseline")
            .mean_score(9.25)
            .duration_secs(1.5)
            .estimator("Ridge")
            .build();

        assert_eq!(record.number(), 7);
        assert_eq!(record.description(), "ridge baseline");
        assert!((record.mean_score() - 9.25).abs() < f64::EPSILON);
        assert!((record.duration_secs() - 1.5).abs() < f64::EPSILON);
        assert_eq!(record.estimator(), "Ridge");
    }

    #[test]
    fn test_experiment_record_from_cv() {
        let result = CvResult {
            fold_results: vec![FoldResult { fold: 0, score: 2.0 }],
            mean_score: 2.0,
            duration_secs: 0.12,
            oof_predictions: vec![],
        };
        let estimator = EstimatorPreset::Ridge.build();
        let record = ExperimentRecord::from_cv(3, "ridge", &result, &estimator);

        assert_eq!(record.number(), 3);
        assert!((record.duration_secs() - 0.12).abs() < f64::EPSILON);
        assert!(record.estimator().starts_with("Pipeline(steps=["));
    }
}
