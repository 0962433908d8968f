//! Pipeline configuration
//!
//! Defaults reproduce the conventional layout: tables under `data/`, snapshots
//! under `models/`, the experiment log at `experiments.md`, seed 303 everywhere.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::schema::TARGET_COLUMN;
use crate::{Error, Result};

/// Shuffle seed shared by fold splitting, bagging and search sampling
pub const DEFAULT_SEED: u64 = 303;

/// Folds used by the experiment runner
pub const EXPERIMENT_FOLDS: usize = 3;

/// Folds used inside the tuning objective
pub const TUNING_FOLDS: usize = 5;

/// Trial budget for hyperparameter search
pub const DEFAULT_TRIALS: usize = 50;

/// Locations of the training and test tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    /// Training table
    pub train: PathBuf,
    /// Test table
    pub test: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            train: PathBuf::from("data/train.csv"),
            test: PathBuf::from("data/test.csv"),
        }
    }
}

/// Configuration shared by the experiment, tuning and serving commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Training/test tables
    pub data: DataPaths,
    /// Target column name
    pub target_column: String,
    /// Directory receiving fitted snapshots
    pub models_dir: PathBuf,
    /// Append-only experiment log
    pub experiment_log: PathBuf,
    /// Shuffle seed
    pub seed: u64,
    /// Folds for experiment runs
    pub experiment_folds: usize,
    /// Folds for each tuning trial
    pub tuning_folds: usize,
    /// Tuning trial budget
    pub n_trials: usize,
    /// Inference server bind address
    pub address: SocketAddr,
    /// Origins admitted by the inference server's CORS policy; `"*"` admits any
    pub cors_origins: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data: DataPaths::default(),
            target_column: TARGET_COLUMN.to_string(),
            models_dir: PathBuf::from("models"),
            experiment_log: PathBuf::from("experiments.md"),
            seed: DEFAULT_SEED,
            experiment_folds: EXPERIMENT_FOLDS,
            tuning_folds: TUNING_FOLDS,
            n_trials: DEFAULT_TRIALS,
            address: SocketAddr::from(([127, 0, 0, 1], 5000)),
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on invalid TOML or invalid values.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check fold counts and trial budget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a fold count is below 2 or the budget is zero.
    pub fn validate(&self) -> Result<()> {
        if self.experiment_folds < 2 || self.tuning_folds < 2 {
            return Err(Error::Config("fold counts must be at least 2".to_string()));
        }
        if self.n_trials == 0 {
            return Err(Error::Config("n_trials must be positive".to_string()));
        }
        Ok(())
    }
}
