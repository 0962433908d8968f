//! Error types for exam-score
//!
//! Every condition here is terminal for the operation that raised it: causes
//! are deterministic (missing files, malformed requests, degenerate inputs), so
//! nothing is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// exam-score error types
#[derive(Error, Debug)]
pub enum Error {
    /// Training or test table is absent
    #[error("Data not found: {}", .0.display())]
    DataNotFound(PathBuf),

    /// Persisted model snapshot is absent
    #[error("Snapshot not found: {}", .0.display())]
    SnapshotNotFound(PathBuf),

    /// Experiment log must be created before the first append
    #[error("Experiment log does not exist: {}\nCreate the file before logging experiments.", .0.display())]
    LogFileMissing(PathBuf),

    /// Dataset has zero rows
    #[error("Dataset is empty: cannot evaluate on zero rows")]
    EmptyDataset,

    /// More folds requested than there are rows
    #[error("Cannot split {rows} rows into {folds} folds")]
    FoldCountError {
        /// Requested fold count
        folds: usize,
        /// Available rows
        rows: usize,
    },

    /// Request or row failed validation
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Ordinal value outside the declared rank order
    #[error("Unknown category for '{column}': {value}")]
    UnknownCategory {
        /// Column name
        column: String,
        /// Offending value
        value: String,
    },

    /// Preprocessing spec violates the column partition or rank orders
    #[error("Invalid preprocessing spec: {0}")]
    InvalidSpec(String),

    /// Invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Snapshot was fitted against a different rank-order version
    #[error("Snapshot rank-order version mismatch: expected {expected}, found {found}")]
    SnapshotVersion {
        /// Version compiled into this binary
        expected: u32,
        /// Version recorded in the snapshot
        found: u32,
    },

    /// Regressor failed to fit or predict
    #[error("Estimator error: {0}")]
    Estimator(String),

    /// Table could not be read or converted
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration file could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON (snapshot) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than the service.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedInput(_) | Self::UnknownCategory { .. } | Self::InvalidInput(_)
        )
    }
}

impl From<smartcore::error::Failed> for Error {
    fn from(err: smartcore::error::Failed) -> Self {
        Self::Estimator(err.to_string())
    }
}
