//! # exam-score: exam score regression with experiment tracking
//!
//! Predicts a student's exam score from study and lifestyle attributes, and
//! carries the offline workflow used to pick the model:
//!
//! ```text
//! storage ──> preprocessing ──> model ──> cv ──> snapshot
//!                                          │
//!                              hpo ────────┤
//!                                          └──> experiment log
//!
//! snapshot ──> service (POST /predict)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use exam_score::cv::CrossValidator;
//! use exam_score::model::EstimatorPreset;
//! use exam_score::schema::{FeatureRow, FeatureTable};
//!
//! let rows: Vec<FeatureRow> = (0..9)
//!     .map(|i| FeatureRow {
//!         age: Some(20.0),
//!         study_hours: Some(f64::from(i)),
//!         class_attendance: Some(90.0),
//!         sleep_hours: Some(7.0),
//!         study_method: Some("self-study".into()),
//!         course: Some("bca".into()),
//!         gender: Some("male".into()),
//!         facility_rating: Some("high".into()),
//!         sleep_quality: Some("good".into()),
//!         exam_difficulty: Some("easy".into()),
//!         internet_access: Some("yes".into()),
//!     })
//!     .collect();
//! let y: Vec<f64> = (0..9).map(|i| 50.0 + f64::from(i)).collect();
//!
//! let cv = CrossValidator::new(3, 303)?;
//! let result = cv.evaluate(&EstimatorPreset::MeanBaseline.build(), &FeatureTable::new(rows), &y)?;
//! assert_eq!(result.fold_results.len(), 3);
//! # Ok::<(), exam_score::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod cv;
pub mod error;
pub mod experiment;
pub mod hpo;
pub mod model;
pub mod preprocessing;
pub mod runner;
pub mod schema;
pub mod service;
pub mod snapshot;
pub mod storage;

pub use error::{Error, Result};
