//! Fitted preprocessing state

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{PreprocessingSpec, RankOrder, Transform};
use crate::schema::{Column, FeatureRow, FeatureTable};
use crate::{Error, Result};

/// Fitted state of one column group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedTransform {
    /// Per-column mean and scale
    StandardScaler {
        /// Scaled columns
        columns: Vec<Column>,
        /// Fit-data means (missing values ignored)
        means: Vec<f64>,
        /// Population standard deviations; 1.0 where the column is constant
        scales: Vec<f64>,
    },
    /// Sorted categories seen during fit, per column
    OneHot {
        /// Encoded columns
        columns: Vec<Column>,
        /// Distinct fit categories, sorted
        categories: Vec<Vec<String>>,
    },
    /// Fixed rank orders (nothing is learned from data)
    Ordinal {
        /// Encoded columns
        columns: Vec<Column>,
        /// Rank orders, parallel to `columns`
        orders: Vec<RankOrder>,
    },
}

impl FittedTransform {
    /// Number of output features.
    #[must_use]
    pub fn n_features_out(&self) -> usize {
        match self {
            Self::StandardScaler { columns, .. } | Self::Ordinal { columns, .. } => columns.len(),
            Self::OneHot { categories, .. } => categories.iter().map(Vec::len).sum(),
        }
    }

    fn transform_into(&self, row: &FeatureRow, out: &mut Vec<f64>) -> Result<()> {
        match self {
            Self::StandardScaler {
                columns,
                means,
                scales,
            } => {
                for ((column, mean), scale) in columns.iter().zip(means).zip(scales) {
                    // Missing values are imputed with the fit mean
                    let value = row.numeric(*column).unwrap_or(*mean);
                    out.push((value - mean) / scale);
                }
            }
            Self::OneHot {
                columns,
                categories,
            } => {
                for (column, cats) in columns.iter().zip(categories) {
                    let hit = row
                        .category(*column)
                        .and_then(|v| cats.iter().position(|c| c == v));
                    out.extend((0..cats.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
                }
            }
            Self::Ordinal { columns, orders } => {
                for (column, order) in columns.iter().zip(orders) {
                    let value = row.category(*column);
                    let rank = value.and_then(|v| order.rank(v)).ok_or_else(|| {
                        Error::UnknownCategory {
                            column: column.name().to_string(),
                            value: value.unwrap_or("<missing>").to_string(),
                        }
                    })?;
                    #[allow(clippy::cast_precision_loss)]
                    out.push(rank as f64);
                }
            }
        }
        Ok(())
    }
}

/// Preprocessor fitted on one training fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    rank_order_version: u32,
    transforms: Vec<FittedTransform>,
}

impl PreprocessingSpec {
    /// Learn scaler statistics and one-hot categories from `table`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDataset`] if `table` has no rows.
    pub fn fit(&self, table: &FeatureTable) -> Result<FittedPreprocessor> {
        if table.is_empty() {
            return Err(Error::EmptyDataset);
        }

        let transforms = self
            .groups()
            .iter()
            .map(|group| {
                let columns = group.columns().to_vec();
                match group.transform() {
                    Transform::StandardScaler => {
                        let (means, scales) = columns
                            .iter()
                            .map(|&c| mean_and_scale(table.rows().iter().filter_map(|r| r.numeric(c))))
                            .unzip();
                        FittedTransform::StandardScaler {
                            columns,
                            means,
                            scales,
                        }
                    }
                    Transform::OneHot => {
                        let categories = columns
                            .iter()
                            .map(|&c| {
                                table
                                    .rows()
                                    .iter()
                                    .filter_map(|r| r.category(c))
                                    .collect::<BTreeSet<_>>()
                                    .into_iter()
                                    .map(ToString::to_string)
                                    .collect()
                            })
                            .collect();
                        FittedTransform::OneHot {
                            columns,
                            categories,
                        }
                    }
                    Transform::Ordinal { orders } => FittedTransform::Ordinal {
                        columns,
                        orders: orders.clone(),
                    },
                }
            })
            .collect();

        Ok(FittedPreprocessor {
            rank_order_version: self.rank_order_version(),
            transforms,
        })
    }
}

impl FittedPreprocessor {
    /// Fitted group transforms, in output order.
    #[must_use]
    pub fn transforms(&self) -> &[FittedTransform] {
        &self.transforms
    }

    /// Rank-order version the preprocessor was fitted under.
    #[must_use]
    pub const fn rank_order_version(&self) -> u32 {
        self.rank_order_version
    }

    /// Width of the transformed feature vector.
    #[must_use]
    pub fn n_features_out(&self) -> usize {
        self.transforms.iter().map(FittedTransform::n_features_out).sum()
    }

    /// Transform one row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCategory`] for an ordinal value outside its order.
    pub fn transform_row(&self, row: &FeatureRow) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.n_features_out());
        for transform in &self.transforms {
            transform.transform_into(row, &mut out)?;
        }
        Ok(out)
    }

    /// Transform every row of `table` into a row-major design matrix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCategory`] for an ordinal value outside its order.
    pub fn transform(&self, table: &FeatureTable) -> Result<Vec<Vec<f64>>> {
        table.rows().iter().map(|row| self.transform_row(row)).collect()
    }
}

/// Mean and population standard deviation; a zero (or undefined) deviation maps
/// to 1.0 so constant columns pass through centred.
fn mean_and_scale(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return (0.0, 1.0);
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    let scale = if std > f64::EPSILON { std } else { 1.0 };
    (mean, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::build_preprocessor;

    fn row(age: f64, method: &str, rating: &str) -> FeatureRow {
        FeatureRow {
            age: Some(age),
            study_hours: Some(2.0),
            class_attendance: Some(90.0),
            sleep_hours: Some(7.0),
            study_method: Some(method.to_string()),
            course: Some("bca".to_string()),
            gender: Some("male".to_string()),
            facility_rating: Some(rating.to_string()),
            sleep_quality: Some("good".to_string()),
            exam_difficulty: Some("easy".to_string()),
            internet_access: Some("yes".to_string()),
        }
    }

    #[test]
    fn test_standard_scaler_statistics() {
        let table = FeatureTable::new(vec![row(18.0, "a", "low"), row(22.0, "b", "high")]);
        let fitted = build_preprocessor().fit(&table).unwrap();

        let FittedTransform::StandardScaler { means, scales, .. } = &fitted.transforms()[0] else {
            panic!("first group is the scaler");
        };
        assert!((means[0] - 20.0).abs() < 1e-12);
        assert!((scales[0] - 2.0).abs() < 1e-12);
        // Constant column keeps a unit scale
        assert!((scales[1] - 1.0).abs() < 1e-12);

        let x = fitted.transform(&table).unwrap();
        assert!((x[0][0] + 1.0).abs() < 1e-12);
        assert!((x[1][0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_output_width() {
        let table = FeatureTable::new(vec![row(18.0, "a", "low"), row(22.0, "b", "high")]);
        let fitted = build_preprocessor().fit(&table).unwrap();
        // 4 numeric + (2 methods + 1 course + 1 gender) + 4 ordinal
        assert_eq!(fitted.n_features_out(), 12);
        assert_eq!(fitted.transform_row(&table.rows()[0]).unwrap().len(), 12);
    }

    #[test]
    fn test_onehot_unseen_category_is_all_zero() {
        let table = FeatureTable::new(vec![row(18.0, "a", "low"), row(22.0, "b", "high")]);
        let fitted = build_preprocessor().fit(&table).unwrap();

        let encoded = fitted.transform_row(&row(20.0, "never-seen", "medium")).unwrap();
        // study_method block follows the 4 scaled columns
        assert_eq!(&encoded[4..6], &[0.0, 0.0]);
    }

    #[test]
    fn test_missing_numeric_imputes_mean() {
        let table = FeatureTable::new(vec![row(18.0, "a", "low"), row(22.0, "b", "high")]);
        let fitted = build_preprocessor().fit(&table).unwrap();

        let mut sparse = row(0.0, "a", "low");
        sparse.age = None;
        assert_eq!(fitted.transform_row(&sparse).unwrap()[0], 0.0);
    }

    #[test]
    fn test_ordinal_unknown_category_fails() {
        let table = FeatureTable::new(vec![row(18.0, "a", "low")]);
        let fitted = build_preprocessor().fit(&table).unwrap();

        let err = fitted.transform_row(&row(18.0, "a", "excellent")).unwrap_err();
        assert!(matches!(err, Error::UnknownCategory { column, .. } if column == "facility_rating"));
    }

    #[test]
    fn test_fit_empty_table() {
        let err = build_preprocessor().fit(&FeatureTable::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyDataset));
    }
}
