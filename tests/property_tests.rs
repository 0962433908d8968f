//! Property-based tests for exam-score
//!
//! - Fold partitions are disjoint and exhaustive
//! - Fitted preprocessing is a pure function of its fit data
//! - Encoders honour declared orders and ignore unseen categories
//! - Run with ProptestConfig::with_cases(100)

use exam_score::cv::KFold;
use exam_score::preprocessing::{build_preprocessor, FittedTransform};
use exam_score::schema::{Column, FeatureRow, FeatureTable};
use proptest::prelude::*;
use std::collections::BTreeSet;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

const METHODS: [&str; 4] = ["self-study", "group study", "coaching", "online videos"];
const COURSES: [&str; 3] = ["bca", "b.sc", "diploma"];
const GENDERS: [&str; 3] = ["male", "female", "other"];

fn arb_order_label(column: Column) -> impl Strategy<Value = String> {
    let labels: Vec<String> = column
        .rank_order()
        .unwrap_or_default()
        .iter()
        .map(ToString::to_string)
        .collect();
    proptest::sample::select(labels)
}

fn arb_row() -> impl Strategy<Value = FeatureRow> {
    (
        (
            proptest::option::weighted(0.9, 17.0f64..25.0),
            0.0f64..10.0,
            40.0f64..100.0,
            4.0f64..10.0,
        ),
        (
            proptest::sample::select(METHODS.to_vec()),
            proptest::sample::select(COURSES.to_vec()),
            proptest::sample::select(GENDERS.to_vec()),
        ),
        (
            arb_order_label(Column::FacilityRating),
            arb_order_label(Column::SleepQuality),
            arb_order_label(Column::ExamDifficulty),
            arb_order_label(Column::InternetAccess),
        ),
    )
        .prop_map(
            |((age, hours, attendance, sleep), (method, course, gender), (fac, sq, diff, net))| {
                FeatureRow {
                    age,
                    study_hours: Some(hours),
                    class_attendance: Some(attendance),
                    sleep_hours: Some(sleep),
                    study_method: Some(method.to_string()),
                    course: Some(course.to_string()),
                    gender: Some(gender.to_string()),
                    facility_rating: Some(fac),
                    sleep_quality: Some(sq),
                    exam_difficulty: Some(diff),
                    internet_access: Some(net),
                }
            },
        )
}

fn arb_table(max_rows: usize) -> impl Strategy<Value = FeatureTable> {
    proptest::collection::vec(arb_row(), 1..=max_rows).prop_map(FeatureTable::new)
}

/// Generate (rows, folds) with 2 <= folds <= rows
fn arb_rows_and_folds() -> impl Strategy<Value = (usize, usize)> {
    (2usize..500).prop_flat_map(|rows| (Just(rows), 2usize..=rows.min(20)))
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Fold Partition Properties
    // ========================================================================

    /// Property: validation folds are pairwise disjoint and cover every row
    #[test]
    fn prop_folds_partition_rows((rows, folds) in arb_rows_and_folds(), seed in any::<u64>()) {
        let split = KFold::new(folds, seed).unwrap().split(rows).unwrap();
        prop_assert_eq!(split.len(), folds);

        let mut seen = BTreeSet::new();
        for fold in &split {
            prop_assert!(!fold.is_empty());
            for &row in fold {
                prop_assert!(seen.insert(row), "row {} in two folds", row);
            }
        }
        prop_assert_eq!(seen, (0..rows).collect::<BTreeSet<_>>());
    }

    /// Property: fold sizes differ by at most one, larger folds first
    #[test]
    fn prop_fold_sizes_balanced((rows, folds) in arb_rows_and_folds()) {
        let sizes: Vec<usize> = KFold::new(folds, 303)
            .unwrap()
            .split(rows)
            .unwrap()
            .iter()
            .map(Vec::len)
            .collect();
        prop_assert!(sizes.windows(2).all(|w| w[0] >= w[1] && w[0] - w[1] <= 1));
    }

    // ========================================================================
    // Preprocessing Properties
    // ========================================================================

    /// Property: applying a fitted preprocessor never changes it, and repeated
    /// application gives identical output
    #[test]
    fn prop_transform_is_idempotent(train in arb_table(30), other in arb_table(30)) {
        let fitted = build_preprocessor().fit(&train).unwrap();
        let snapshot = fitted.clone();

        let first = fitted.transform(&other).unwrap();
        let second = fitted.transform(&other).unwrap();
        fitted.transform(&train).unwrap();

        prop_assert_eq!(first, second);
        prop_assert_eq!(&fitted, &snapshot);
    }

    /// Property: ordinal codes follow the declared rank order
    #[test]
    fn prop_ordinal_encoding_monotonic(train in arb_table(10)) {
        let fitted = build_preprocessor().fit(&train).unwrap();
        let Some(FittedTransform::Ordinal { columns, .. }) = fitted.transforms().last() else {
            return Err(TestCaseError::fail("last group is ordinal"));
        };
        let offset = fitted.n_features_out() - columns.len();

        for (k, column) in columns.iter().enumerate() {
            let mut codes = Vec::new();
            for label in column.rank_order().unwrap() {
                let mut row = train.rows()[0].clone();
                row.set_category(*column, Some((*label).to_string()));
                codes.push(fitted.transform_row(&row).unwrap()[offset + k]);
            }
            prop_assert!(codes.windows(2).all(|w| w[0] < w[1]), "{}: {:?}", column, codes);
            prop_assert_eq!(codes[0], 0.0);
        }
    }

    /// Property: a category unseen at fit time encodes as all zeros
    #[test]
    fn prop_onehot_unseen_is_all_zero(train in arb_table(20), suffix in "[a-z]{3,8}") {
        let fitted = build_preprocessor().fit(&train).unwrap();
        let Some(FittedTransform::OneHot { columns, categories }) = fitted.transforms().get(1) else {
            return Err(TestCaseError::fail("second group is one-hot"));
        };

        let mut row = train.rows()[0].clone();
        for column in columns {
            row.set_category(*column, Some(format!("unseen-{suffix}")));
        }
        let encoded = fitted.transform_row(&row).unwrap();

        let width: usize = categories.iter().map(Vec::len).sum();
        prop_assert!(encoded[4..4 + width].iter().all(|v| *v == 0.0));
    }
}
