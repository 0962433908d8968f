//! Inference service
//!
//! One fitted model is loaded when the service is built and shared read-only
//! by every request. Requests carry the 11 feature values positionally; they
//! are validated in full before the model is touched.

#[cfg(feature = "server")]
pub mod server;

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::model::{FittedModel, Predict};
use crate::schema::FeatureRow;
use crate::snapshot::load_snapshot;
use crate::Result;

/// Single-row prediction over a shared model
#[derive(Debug)]
pub struct InferenceService<M> {
    model: Arc<M>,
}

impl<M> Clone for InferenceService<M> {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
        }
    }
}

impl InferenceService<FittedModel> {
    /// Load the snapshot at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SnapshotNotFound`] if `path` is absent, or the
    /// snapshot's decode or version error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(load_snapshot(path)?.into_model()))
    }
}

impl<M: Predict> InferenceService<M> {
    /// Wrap a fitted model.
    #[must_use]
    pub fn new(model: M) -> Self {
        Self {
            model: Arc::new(model),
        }
    }

    /// The shared model.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Predict from a validated row.
    ///
    /// # Errors
    ///
    /// Returns the model's error unchanged.
    pub fn predict_row(&self, row: &FeatureRow) -> Result<f64> {
        self.model.predict_row(row)
    }

    /// Validate positional JSON values, then predict.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedInput`] without calling the model when
    /// the values are not exactly 11 non-null values of the right types.
    pub fn predict_values(&self, values: &[Value]) -> Result<f64> {
        let row = FeatureRow::from_json_values(values)?;
        let prediction = self.model.predict_row(&row)?;
        debug!(prediction, "prediction served");
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl Predict for Counting {
        fn predict_row(&self, row: &FeatureRow) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(row.study_hours.unwrap_or_default() * 10.0)
        }
    }

    fn values() -> Vec<Value> {
        vec![
            json!(21),
            json!(4.5),
            json!(88.0),
            json!(7),
            json!("group study"),
            json!("b.tech"),
            json!("other"),
            json!("medium"),
            json!("good"),
            json!("hard"),
            json!("no"),
        ]
    }

    #[test]
    fn test_predict_values() {
        let service = InferenceService::new(Counting::default());
        assert!((service.predict_values(&values()).unwrap() - 45.0).abs() < 1e-12);
        assert_eq!(service.model().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_short_row_is_rejected_before_model() {
        let service = InferenceService::new(Counting::default());
        let mut short = values();
        short.pop();

        let err = service.predict_values(&short).unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
        assert_eq!(service.model().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clones_share_model() {
        let service = InferenceService::new(Counting::default());
        let clone = service.clone();
        clone.predict_values(&values()).unwrap();
        assert_eq!(service.model().calls.load(Ordering::SeqCst), 1);
    }
}
