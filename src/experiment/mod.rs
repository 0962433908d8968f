//! Experiment tracking
//!
//! Results of cross-validated runs are kept in an append-only markdown log.
//!
//! ```text
//! CvResult + Estimator ──> ExperimentRecord ──append_record──> experiments.md
//!                                                                   │
//!                                     Vec<ParsedRecord> <──parse_log┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use exam_score::experiment::{parse_log_str, render_record, ExperimentRecord};
//!
//! let record = ExperimentRecord::builder(1, "mean baseline")
//!     .mean_score(12.5)
//!     .duration_secs(0.03)
//!     .estimator("MeanBaseline")
//!     .build();
//!
//! let parsed = parse_log_str(&render_record(&record));
//! assert_eq!(parsed[0].description, "mean baseline");
//! ```

mod log;
mod record;

pub use log::{append_record, parse_log, parse_log_str, render_record, ParsedRecord};
pub use record::{ExperimentRecord, ExperimentRecordBuilder};
