//! Tests for error types

use exam_score::Error;
use std::path::PathBuf;

#[test]
fn test_data_not_found_error() {
    let error = Error::DataNotFound(PathBuf::from("data/train.csv"));
    let error_str = format!("{error}");
    assert!(error_str.contains("Data not found"));
    assert!(error_str.contains("data/train.csv"));
}

#[test]
fn test_log_file_missing_error() {
    let error = Error::LogFileMissing(PathBuf::from("experiments.md"));
    let error_str = format!("{error}");
    assert!(error_str.contains("experiments.md"));
    assert!(error_str.contains("Create the file"));
}

#[test]
fn test_fold_count_error() {
    let error = Error::FoldCountError { folds: 5, rows: 3 };
    assert_eq!(format!("{error}"), "Cannot split 3 rows into 5 folds");
}

#[test]
fn test_unknown_category_error() {
    let error = Error::UnknownCategory {
        column: "sleep_quality".to_string(),
        value: "excellent".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("sleep_quality"));
    assert!(error_str.contains("excellent"));
}

#[test]
fn test_snapshot_version_error() {
    let error = Error::SnapshotVersion {
        expected: 1,
        found: 2,
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("expected 1"));
    assert!(error_str.contains("found 2"));
}

#[test]
fn test_client_error_classification() {
    assert!(Error::MalformedInput("x".to_string()).is_client_error());
    assert!(Error::InvalidInput("x".to_string()).is_client_error());
    assert!(Error::UnknownCategory {
        column: "c".to_string(),
        value: "v".to_string()
    }
    .is_client_error());

    assert!(!Error::EmptyDataset.is_client_error());
    assert!(!Error::Estimator("singular".to_string()).is_client_error());
    assert!(!Error::SnapshotNotFound(PathBuf::from("m.json")).is_client_error());
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    assert!(format!("{error}").contains("IO error"));
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json_error.into();
    assert!(format!("{error}").contains("JSON error"));
}
