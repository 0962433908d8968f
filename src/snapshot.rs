//! Persisted model snapshots
//!
//! A snapshot is one [`FittedModel`] plus the metadata identifying which
//! evaluation produced it. Files are named `<estimator>_<experiment>.json` and
//! are written once; later writes for the same pair replace the file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::model::FittedModel;
use crate::schema::RANK_ORDER_VERSION;
use crate::{Error, Result};

/// Identifies the evaluation a snapshot came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Estimator name
    pub estimator: String,
    /// Experiment number
    pub experiment: u32,
    /// Fold whose training split produced the model
    pub fold: usize,
    /// Write time
    pub created_at: DateTime<Utc>,
}

/// On-disk snapshot: metadata and fitted model
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    metadata: SnapshotMetadata,
    model: FittedModel,
}

impl Snapshot {
    /// Snapshot metadata.
    #[must_use]
    pub const fn metadata(&self) -> &SnapshotMetadata {
        &self.metadata
    }

    /// The fitted model.
    #[must_use]
    pub const fn model(&self) -> &FittedModel {
        &self.model
    }

    /// Take ownership of the fitted model.
    #[must_use]
    pub fn into_model(self) -> FittedModel {
        self.model
    }
}

/// Directory of snapshots
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a snapshot for `(estimator, experiment)` is written to.
    #[must_use]
    pub fn path_for(&self, estimator: &str, experiment: u32) -> PathBuf {
        self.dir.join(format!("{estimator}_{experiment}.json"))
    }

    /// Write `model` and return the file path.
    ///
    /// # Errors
    ///
    /// Returns an IO or JSON error if the directory or file cannot be written.
    pub fn save(&self, model: &FittedModel, experiment: u32, fold: usize) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(model.name(), experiment);

        let snapshot = SnapshotRef {
            metadata: SnapshotMetadata {
                estimator: model.name().to_string(),
                experiment,
                fold,
                created_at: Utc::now(),
            },
            model,
        };
        let bytes = serde_json::to_vec(&snapshot)?;
        fs::write(&path, bytes)?;

        info!(path = %path.display(), fold, "snapshot written");
        Ok(path)
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    metadata: SnapshotMetadata,
    model: &'a FittedModel,
}

/// Read a snapshot written by [`SnapshotStore::save`].
///
/// # Errors
///
/// Returns [`Error::SnapshotNotFound`] if `path` is absent and
/// [`Error::SnapshotVersion`] if the model was fitted under a different
/// rank-order version.
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::SnapshotNotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path)?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;

    let found = snapshot.model.preprocessor().rank_order_version();
    if found != RANK_ORDER_VERSION {
        return Err(Error::SnapshotVersion {
            expected: RANK_ORDER_VERSION,
            found,
        });
    }
    info!(
        path = %path.display(),
        estimator = %snapshot.metadata.estimator,
        experiment = snapshot.metadata.experiment,
        "snapshot loaded"
    );
    Ok(snapshot)
}
