//! Feature preprocessing spec
//!
//! A [`PreprocessingSpec`] is a declarative, immutable description of how the 11
//! feature columns are turned into a numeric design matrix:
//!
//! ```text
//! num          StandardScaler   age, study_hours, class_attendance, sleep_hours
//! cat_onehot   OneHotEncoder    study_method, course, gender
//! cat_ordinal  OrdinalEncoder   facility_rating, sleep_quality, exam_difficulty, internet_access
//! ```
//!
//! The spec holds no fitted state. [`PreprocessingSpec::fit`] produces a
//! [`FittedPreprocessor`], which is why the preprocessor is fitted inside each
//! fold together with the regressor: statistics from a validation fold can never
//! reach its training fold.
//!
//! ## Example
//!
//! ```rust
//! use exam_score::preprocessing::build_preprocessor;
//!
//! let spec = build_preprocessor();
//! assert_eq!(spec.groups().len(), 3);
//! assert_eq!(spec, build_preprocessor());
//! ```

mod fitted;

pub use fitted::{FittedPreprocessor, FittedTransform};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::schema::{Column, ColumnKind, N_FEATURES, RANK_ORDER_VERSION};
use crate::{Error, Result};

/// Increasing category order of one ordinal column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankOrder {
    labels: Vec<String>,
}

impl RankOrder {
    /// Create a rank order from labels listed lowest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpec`] if the order is empty or repeats a label.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(Error::InvalidSpec("rank order is empty".to_string()));
        }
        let distinct: BTreeSet<&str> = labels.iter().map(String::as_str).collect();
        if distinct.len() != labels.len() {
            return Err(Error::InvalidSpec(format!(
                "rank order repeats a label: {labels:?}"
            )));
        }
        Ok(Self { labels })
    }

    /// Labels, lowest rank first.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// 0-based rank of `label`.
    #[must_use]
    pub fn rank(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

/// Transform applied to a column group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    /// z-score normalisation with statistics from the fit data
    StandardScaler,
    /// One indicator per category seen during fit; unseen → all zeros
    OneHot,
    /// Category → rank in the given order, one order per column
    Ordinal {
        /// Rank orders, parallel to the group's columns
        orders: Vec<RankOrder>,
    },
}

impl Transform {
    /// Column kind this transform accepts.
    #[must_use]
    pub const fn accepts(&self) -> ColumnKind {
        match self {
            Self::StandardScaler => ColumnKind::Numeric,
            Self::OneHot => ColumnKind::Nominal,
            Self::Ordinal { .. } => ColumnKind::Ordinal,
        }
    }
}

/// Named group of columns sharing one transform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnGroup {
    name: String,
    columns: Vec<Column>,
    transform: Transform,
}

impl ColumnGroup {
    /// Create a group. Validation happens in [`PreprocessingSpec::new`].
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<Column>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            columns,
            transform,
        }
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in the group.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Transform applied to the group.
    #[must_use]
    pub const fn transform(&self) -> &Transform {
        &self.transform
    }
}

/// Validated column-group partition of the feature schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessingSpec {
    rank_order_version: u32,
    groups: Vec<ColumnGroup>,
}

impl PreprocessingSpec {
    /// Validate and assemble a spec.
    ///
    /// Checks that the groups partition the 11 feature columns exactly, that
    /// every column sits under a transform for its kind, and that each ordinal
    /// order equals the column's canonical rank order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpec`] describing the first violation found.
    pub fn new(groups: Vec<ColumnGroup>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        let mut names = BTreeSet::new();

        for group in &groups {
            if !names.insert(group.name.as_str()) {
                return Err(Error::InvalidSpec(format!(
                    "duplicate group name '{}'",
                    group.name
                )));
            }
            if group.columns.is_empty() {
                return Err(Error::InvalidSpec(format!("group '{}' is empty", group.name)));
            }

            for &column in &group.columns {
                if !seen.insert(column) {
                    return Err(Error::InvalidSpec(format!(
                        "column '{column}' appears in more than one group"
                    )));
                }
                if column.kind() != group.transform.accepts() {
                    return Err(Error::InvalidSpec(format!(
                        "column '{column}' ({:?}) cannot use the transform of group '{}'",
                        column.kind(),
                        group.name
                    )));
                }
            }

            if let Transform::Ordinal { orders } = &group.transform {
                validate_rank_orders(group, orders)?;
            }
        }

        if seen.len() != N_FEATURES {
            let missing: Vec<&str> = Column::ALL
                .iter()
                .filter(|c| !seen.contains(*c))
                .map(|c| c.name())
                .collect();
            return Err(Error::InvalidSpec(format!(
                "columns not covered by any group: {missing:?}"
            )));
        }

        Ok(Self {
            rank_order_version: RANK_ORDER_VERSION,
            groups,
        })
    }

    /// Column groups, in output order.
    #[must_use]
    pub fn groups(&self) -> &[ColumnGroup] {
        &self.groups
    }

    /// Version of the rank orders this spec was validated against.
    #[must_use]
    pub const fn rank_order_version(&self) -> u32 {
        self.rank_order_version
    }

    /// Find a group by name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&ColumnGroup> {
        self.groups.iter().find(|g| g.name == name)
    }
}

impl fmt::Display for PreprocessingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ColumnTransformer(transformers=[")?;
        for group in &self.groups {
            let columns: Vec<&str> = group.columns.iter().map(|c| c.name()).collect();
            let transform = match &group.transform {
                Transform::StandardScaler => "StandardScaler()".to_string(),
                Transform::OneHot => "OneHotEncoder(handle_unknown='ignore')".to_string(),
                Transform::Ordinal { orders } => {
                    let orders: Vec<&[String]> = orders.iter().map(RankOrder::labels).collect();
                    format!("OrdinalEncoder(categories={orders:?})")
                }
            };
            writeln!(f, "    ('{}', {transform}, {columns:?}),", group.name)?;
        }
        write!(f, "])")
    }
}

fn validate_rank_orders(group: &ColumnGroup, orders: &[RankOrder]) -> Result<()> {
    if orders.len() != group.columns.len() {
        return Err(Error::InvalidSpec(format!(
            "group '{}' has {} columns but {} rank orders",
            group.name,
            group.columns.len(),
            orders.len()
        )));
    }
    for (column, order) in group.columns.iter().zip(orders) {
        let canonical = column.rank_order().unwrap_or_default();
        let matches = order.labels().len() == canonical.len()
            && order.labels().iter().zip(canonical).all(|(a, b)| a == b);
        if !matches {
            return Err(Error::InvalidSpec(format!(
                "rank order for '{column}' is {:?}, expected {canonical:?} (version {RANK_ORDER_VERSION})",
                order.labels()
            )));
        }
    }
    Ok(())
}

fn canonical_order(column: Column) -> RankOrder {
    RankOrder {
        labels: column
            .rank_order()
            .unwrap_or_default()
            .iter()
            .map(ToString::to_string)
            .collect(),
    }
}

/// Build the exam-score preprocessing spec.
///
/// Pure and deterministic: every call returns an equal spec.
#[must_use]
pub fn build_preprocessor() -> PreprocessingSpec {
    let num_cols = vec![
        Column::Age,
        Column::StudyHours,
        Column::ClassAttendance,
        Column::SleepHours,
    ];
    let onehot_cols = vec![Column::StudyMethod, Column::Course, Column::Gender];
    let ordinal_cols = vec![
        Column::FacilityRating,
        Column::SleepQuality,
        Column::ExamDifficulty,
        Column::InternetAccess,
    ];
    let orders = ordinal_cols.iter().map(|&c| canonical_order(c)).collect();

    // The partition is a compile-time constant of the schema; it passes
    // `PreprocessingSpec::new` by construction (see test_build_preprocessor_validates).
    PreprocessingSpec {
        rank_order_version: RANK_ORDER_VERSION,
        groups: vec![
            ColumnGroup::new("num", num_cols, Transform::StandardScaler),
            ColumnGroup::new("cat_onehot", onehot_cols, Transform::OneHot),
            ColumnGroup::new("cat_ordinal", ordinal_cols, Transform::Ordinal { orders }),
        ],
    }
}
