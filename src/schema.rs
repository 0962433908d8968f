//! Fixed feature schema for the exam-score tables
//!
//! 11 feature columns in schema order, plus the identifier and the target.
//! The ordinal rank orders live here next to the columns they describe and are
//! versioned: snapshots record [`RANK_ORDER_VERSION`] and refuse to load under a
//! different one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::{Error, Result};

/// Version of the canonical rank orders below. Bump on any change.
pub const RANK_ORDER_VERSION: u32 = 1;

/// Identifier column dropped before model consumption
pub const ID_COLUMN: &str = "id";

/// Target column
pub const TARGET_COLUMN: &str = "exam_score";

/// Number of feature columns
pub const N_FEATURES: usize = 11;

/// Storage type of a feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Real-valued
    Numeric,
    /// Unordered categories
    Nominal,
    /// Categories with a fixed rank order
    Ordinal,
}

/// The 11 feature columns, declared in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Column {
    Age,
    StudyHours,
    ClassAttendance,
    SleepHours,
    StudyMethod,
    Course,
    Gender,
    FacilityRating,
    SleepQuality,
    ExamDifficulty,
    InternetAccess,
}

impl Column {
    /// All feature columns in schema order.
    pub const ALL: [Self; N_FEATURES] = [
        Self::Age,
        Self::StudyHours,
        Self::ClassAttendance,
        Self::SleepHours,
        Self::StudyMethod,
        Self::Course,
        Self::Gender,
        Self::FacilityRating,
        Self::SleepQuality,
        Self::ExamDifficulty,
        Self::InternetAccess,
    ];

    /// Column header in the training tables.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::StudyHours => "study_hours",
            Self::ClassAttendance => "class_attendance",
            Self::SleepHours => "sleep_hours",
            Self::StudyMethod => "study_method",
            Self::Course => "course",
            Self::Gender => "gender",
            Self::FacilityRating => "facility_rating",
            Self::SleepQuality => "sleep_quality",
            Self::ExamDifficulty => "exam_difficulty",
            Self::InternetAccess => "internet_access",
        }
    }

    /// Storage type of the column.
    #[must_use]
    pub const fn kind(self) -> ColumnKind {
        match self {
            Self::Age | Self::StudyHours | Self::ClassAttendance | Self::SleepHours => {
                ColumnKind::Numeric
            }
            Self::StudyMethod | Self::Course | Self::Gender => ColumnKind::Nominal,
            Self::FacilityRating
            | Self::SleepQuality
            | Self::ExamDifficulty
            | Self::InternetAccess => ColumnKind::Ordinal,
        }
    }

    /// Canonical increasing rank order for ordinal columns.
    #[must_use]
    pub const fn rank_order(self) -> Option<&'static [&'static str]> {
        match self {
            Self::FacilityRating => Some(&["low", "medium", "high"]),
            Self::SleepQuality => Some(&["poor", "average", "good"]),
            Self::ExamDifficulty => Some(&["easy", "moderate", "hard"]),
            Self::InternetAccess => Some(&["no", "yes"]),
            _ => None,
        }
    }

    /// Position of the column in schema order.
    #[must_use]
    pub fn position(self) -> usize {
        Self::ALL.iter().position(|c| *c == self).unwrap_or(N_FEATURES)
    }

    /// Look up a column by header name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One feature row. `None` marks a missing value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct FeatureRow {
    pub age: Option<f64>,
    pub study_hours: Option<f64>,
    pub class_attendance: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub study_method: Option<String>,
    pub course: Option<String>,
    pub gender: Option<String>,
    pub facility_rating: Option<String>,
    pub sleep_quality: Option<String>,
    pub exam_difficulty: Option<String>,
    pub internet_access: Option<String>,
}

impl FeatureRow {
    /// Numeric value of `column`; `None` for missing values and categorical columns.
    #[must_use]
    pub const fn numeric(&self, column: Column) -> Option<f64> {
        match column {
            Column::Age => self.age,
            Column::StudyHours => self.study_hours,
            Column::ClassAttendance => self.class_attendance,
            Column::SleepHours => self.sleep_hours,
            _ => None,
        }
    }

    /// Category label of `column`; `None` for missing values and numeric columns.
    #[must_use]
    pub fn category(&self, column: Column) -> Option<&str> {
        let value = match column {
            Column::StudyMethod => &self.study_method,
            Column::Course => &self.course,
            Column::Gender => &self.gender,
            Column::FacilityRating => &self.facility_rating,
            Column::SleepQuality => &self.sleep_quality,
            Column::ExamDifficulty => &self.exam_difficulty,
            Column::InternetAccess => &self.internet_access,
            _ => return None,
        };
        value.as_deref()
    }

    /// Set a numeric column. No-op on categorical columns.
    pub fn set_numeric(&mut self, column: Column, value: Option<f64>) {
        match column {
            Column::Age => self.age = value,
            Column::StudyHours => self.study_hours = value,
            Column::ClassAttendance => self.class_attendance = value,
            Column::SleepHours => self.sleep_hours = value,
            _ => {}
        }
    }

    /// Set a categorical column. No-op on numeric columns.
    pub fn set_category(&mut self, column: Column, value: Option<String>) {
        match column {
            Column::StudyMethod => self.study_method = value,
            Column::Course => self.course = value,
            Column::Gender => self.gender = value,
            Column::FacilityRating => self.facility_rating = value,
            Column::SleepQuality => self.sleep_quality = value,
            Column::ExamDifficulty => self.exam_difficulty = value,
            Column::InternetAccess => self.internet_access = value,
            _ => {}
        }
    }

    /// Whether `column` holds a value.
    #[must_use]
    pub fn is_present(&self, column: Column) -> bool {
        match column.kind() {
            ColumnKind::Numeric => self.numeric(column).is_some(),
            ColumnKind::Nominal | ColumnKind::Ordinal => self.category(column).is_some(),
        }
    }

    /// Build a row from exactly 11 JSON values in schema order.
    ///
    /// Numeric columns take JSON numbers, categorical columns take strings.
    /// Nulls are rejected: an inference row must carry every field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] on wrong arity, nulls, or wrong types.
    pub fn from_json_values(values: &[Value]) -> Result<Self> {
        if values.len() != N_FEATURES {
            return Err(Error::MalformedInput(format!(
                "expected {N_FEATURES} features, got {}",
                values.len()
            )));
        }

        let mut row = Self::default();
        for (column, value) in Column::ALL.into_iter().zip(values) {
            match (column.kind(), value) {
                (_, Value::Null) => {
                    return Err(Error::MalformedInput(format!("missing value for '{column}'")));
                }
                (ColumnKind::Numeric, Value::Number(n)) => {
                    let v = n.as_f64().ok_or_else(|| {
                        Error::MalformedInput(format!("'{column}' is not representable as f64"))
                    })?;
                    row.set_numeric(column, Some(v));
                }
                (ColumnKind::Nominal | ColumnKind::Ordinal, Value::String(s)) => {
                    row.set_category(column, Some(s.clone()));
                }
                (ColumnKind::Numeric, other) => {
                    return Err(Error::MalformedInput(format!(
                        "'{column}' must be a number, got {other}"
                    )));
                }
                (_, other) => {
                    return Err(Error::MalformedInput(format!(
                        "'{column}' must be a string, got {other}"
                    )));
                }
            }
        }
        Ok(row)
    }
}

/// Ordered feature rows, identifier and target already removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Wrap rows.
    #[must_use]
    pub const fn new(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Rows at `indices`, in the order given.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

impl FromIterator<FeatureRow> for FeatureTable {
    fn from_iter<I: IntoIterator<Item = FeatureRow>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_row() -> Vec<Value> {
        vec![
            json!(21),
            json!(4.5),
            json!(88.0),
            json!(7.0),
            json!("group study"),
            json!("b.sc"),
            json!("female"),
            json!("high"),
            json!("good"),
            json!("moderate"),
            json!("yes"),
        ]
    }

    #[test]
    fn test_columns_in_schema_order() {
        let names: Vec<_> = Column::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names[0], "age");
        assert_eq!(names[10], "internet_access");
        assert_eq!(Column::from_name("sleep_quality"), Some(Column::SleepQuality));
        assert_eq!(Column::from_name("id"), None);
    }

    #[test]
    fn test_rank_orders_only_on_ordinal() {
        for column in Column::ALL {
            assert_eq!(
                column.rank_order().is_some(),
                column.kind() == ColumnKind::Ordinal,
                "{column}"
            );
        }
    }

    #[test]
    fn test_from_json_values() {
        let row = FeatureRow::from_json_values(&full_row()).unwrap();
        assert_eq!(row.age, Some(21.0));
        assert_eq!(row.category(Column::Course), Some("b.sc"));
        assert!(Column::ALL.iter().all(|c| row.is_present(*c)));
    }

    #[test]
    fn test_from_json_values_rejects_short_row() {
        let mut values = full_row();
        values.pop();
        let err = FeatureRow::from_json_values(&values).unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
    }

    #[test]
    fn test_from_json_values_rejects_null_and_type_mismatch() {
        let mut values = full_row();
        values[3] = Value::Null;
        assert!(matches!(
            FeatureRow::from_json_values(&values),
            Err(Error::MalformedInput(_))
        ));

        let mut values = full_row();
        values[0] = json!("twenty");
        assert!(matches!(
            FeatureRow::from_json_values(&values),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_select_preserves_given_order() {
        let table: FeatureTable = (0..4)
            .map(|i| FeatureRow {
                age: Some(f64::from(i)),
                ..FeatureRow::default()
            })
            .collect();
        let picked = table.select(&[3, 1]);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.rows()[0].age, Some(3.0));
        assert_eq!(picked.rows()[1].age, Some(1.0));
    }
}
