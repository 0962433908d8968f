//! Data loader (Arrow CSV / Parquet)
//!
//! Reads the fixed-schema training and test tables into Arrow record batches,
//! then splits a table into a typed [`FeatureTable`] and the target column.
//! No transformation is applied on load; column types come from the storage
//! format's own inference (CSV) or embedded schema (Parquet).

use crate::config::DataPaths;
use crate::schema::{Column, ColumnKind, FeatureRow, FeatureTable, ID_COLUMN};
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float64Type};
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Records sampled by the CSV reader to infer column types
const SCHEMA_INFERENCE_RECORDS: usize = 1000;

/// Rows per record batch when reading CSV or Parquet
const BATCH_ROWS: usize = 8192;

/// In-memory table loaded from CSV or Parquet
#[derive(Debug, Clone, Default)]
pub struct Table {
    batches: Vec<RecordBatch>,
}

impl Table {
    /// Create a table from existing batches
    ///
    /// Useful for testing
    #[must_use]
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self { batches }
    }

    /// Load a table, picking the reader from the file extension
    /// (`.parquet` → Parquet, anything else → CSV with a header row).
    ///
    /// # Errors
    /// Returns [`Error::DataNotFound`] if the path is absent, or a storage error
    /// if the file cannot be parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::DataNotFound(path.to_path_buf()));
        }

        let is_parquet = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
        let table = if is_parquet {
            Self::load_parquet(path)?
        } else {
            Self::load_csv(path)?
        };

        info!(path = %path.display(), rows = table.num_rows(), "loaded table");
        Ok(table)
    }

    /// Load table from a CSV file with a header row
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        use arrow::csv::reader::Format;
        use arrow::csv::ReaderBuilder;

        let mut file = File::open(path.as_ref())
            .map_err(|e| Error::Storage(format!("Failed to open CSV file: {e}")))?;

        let (schema, _) = Format::default()
            .with_header(true)
            .infer_schema(&mut file, Some(SCHEMA_INFERENCE_RECORDS))
            .map_err(|e| Error::Storage(format!("Failed to infer CSV schema: {e}")))?;
        file.rewind()?;
        debug!(?schema, "inferred CSV schema");

        let reader = ReaderBuilder::new(Arc::new(schema))
            .with_header(true)
            .with_batch_size(BATCH_ROWS)
            .build(file)
            .map_err(|e| Error::Storage(format!("Failed to create CSV reader: {e}")))?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch =
                batch.map_err(|e| Error::Storage(format!("Failed to read CSV batch: {e}")))?;
            batches.push(batch);
        }

        Ok(Self { batches })
    }

    /// Load a Parquet table, keeping the column types embedded in its schema.
    ///
    /// # Errors
    /// Returns a storage error if the file is not valid Parquet
    pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let path = path.as_ref();
        let parquet_err = |what: &str, e: &dyn std::fmt::Display| {
            Error::Storage(format!("{what} {}: {e}", path.display()))
        };

        let file = File::open(path).map_err(|e| parquet_err("cannot open", &e))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| parquet_err("invalid Parquet file", &e))?;
        debug!(
            row_groups = builder.metadata().num_row_groups(),
            "reading Parquet table"
        );

        let batches = builder
            .with_batch_size(BATCH_ROWS)
            .build()
            .map_err(|e| parquet_err("cannot read", &e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| parquet_err("corrupt record batch in", &e))?;

        Ok(Self { batches })
    }

    /// Get all record batches
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total number of rows across batches
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Column names of the first batch (empty for an empty table)
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batches
            .first()
            .map(|b| b.schema().fields().iter().map(|f| f.name().clone()).collect())
            .unwrap_or_default()
    }
}

/// Read the training and test tables.
///
/// # Errors
/// Fails with [`Error::DataNotFound`] if either path is absent.
pub fn load_data(paths: &DataPaths) -> Result<(Table, Table)> {
    // Check both up front so a missing test table fails before the train read.
    for path in [&paths.train, &paths.test] {
        if !path.exists() {
            return Err(Error::DataNotFound(path.clone()));
        }
    }
    Ok((Table::load(&paths.train)?, Table::load(&paths.test)?))
}

/// Drop the identifier and `target_col`, returning the typed feature table and
/// the target sequence. Row order and row count are preserved.
///
/// # Errors
/// Returns a storage error if a feature or the target column is absent or has
/// an unusable type, and [`Error::MalformedInput`] on a null target.
pub fn get_features_and_labels(
    table: &Table,
    target_col: &str,
) -> Result<(FeatureTable, Vec<f64>)> {
    let mut rows = Vec::with_capacity(table.num_rows());
    let mut targets = Vec::with_capacity(table.num_rows());

    for batch in table.batches() {
        let target = numeric_column(batch, target_col)?;
        let mut batch_rows = vec![FeatureRow::default(); batch.num_rows()];

        for column in Column::ALL {
            match column.kind() {
                ColumnKind::Numeric => {
                    let values = numeric_column(batch, column.name())?;
                    for (row, value) in batch_rows.iter_mut().zip(values) {
                        row.set_numeric(column, value);
                    }
                }
                ColumnKind::Nominal | ColumnKind::Ordinal => {
                    let values = string_column(batch, column.name())?;
                    for (row, value) in batch_rows.iter_mut().zip(values) {
                        row.set_category(column, value);
                    }
                }
            }
        }

        for (i, value) in target.into_iter().enumerate() {
            let value = value.ok_or_else(|| {
                Error::MalformedInput(format!("null {target_col} at row {}", rows.len() + i))
            })?;
            targets.push(value);
        }
        rows.extend(batch_rows);
    }

    debug!(
        rows = rows.len(),
        dropped = ?[ID_COLUMN, target_col],
        "split features and labels"
    );
    Ok((FeatureTable::new(rows), targets))
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::Storage(format!("Missing column '{name}'")))
}

fn numeric_column(batch: &RecordBatch, name: &str) -> Result<Vec<Option<f64>>> {
    let array = column(batch, name)?;
    if !array.data_type().is_numeric() {
        return Err(Error::Storage(format!(
            "Column '{name}' must be numeric, found {}",
            array.data_type()
        )));
    }
    let array = arrow::compute::cast(array, &DataType::Float64)?;
    let values = array.as_primitive::<Float64Type>();
    Ok((0..values.len())
        .map(|i| (!values.is_null(i)).then(|| values.value(i)))
        .collect())
}

fn string_column(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>> {
    let array = column(batch, name)?;
    let array = arrow::compute::cast(array, &DataType::Utf8)?;
    let values = array.as_string::<i32>();
    Ok((0..values.len())
        .map(|i| {
            if values.is_null(i) || values.value(i).is_empty() {
                None
            } else {
                Some(values.value(i).to_string())
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    const HEADER: &str = "id,age,gender,course,study_hours,class_attendance,internet_access,sleep_hours,sleep_quality,study_method,facility_rating,exam_difficulty,exam_score";

    fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{HEADER}").unwrap();
        write!(file, "{body}").unwrap();
        path
    }

    #[test]
    fn test_load_missing_file() {
        let err = Table::load("does/not/exist.csv").unwrap_err();
        assert!(matches!(err, Error::DataNotFound(_)));
    }

    #[test]
    fn test_load_data_missing_test_table() {
        let dir = tempfile::tempdir().unwrap();
        let train = write_csv(dir.path(), "train.csv", "0,20,male,bca,3.5,80.0,yes,7.0,good,self-study,high,easy,70.5\n");
        let paths = DataPaths {
            train,
            test: dir.path().join("test.csv"),
        };
        let err = load_data(&paths).unwrap_err();
        assert!(matches!(err, Error::DataNotFound(p) if p.ends_with("test.csv")));
    }

    #[test]
    fn test_features_and_labels_drop_id_and_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "train.csv",
            "0,20,male,bca,3.5,80.0,yes,7.0,good,self-study,high,easy,70.5\n\
             1,22,female,b.sc,,91.5,no,6.0,poor,group study,low,hard,55.0\n\
             2,19,other,bca,1.0,60.0,yes,8.5,average,,medium,moderate,48.25\n",
        );

        let table = Table::load(&path).unwrap();
        assert_eq!(table.num_rows(), 3);
        assert!(table.column_names().contains(&"id".to_string()));

        let (features, targets) = get_features_and_labels(&table, "exam_score").unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(targets, vec![70.5, 55.0, 48.25]);

        let first = &features.rows()[0];
        assert_eq!(first.age, Some(20.0));
        assert_eq!(first.facility_rating.as_deref(), Some("high"));

        // Empty cells are missing values
        assert_eq!(features.rows()[1].study_hours, None);
        assert_eq!(features.rows()[2].study_method, None);
    }

    #[test]
    fn test_parquet_round_trip() {
        use arrow::array::{Float64Array, Int64Array, StringArray};
        use arrow::datatypes::{Field, Schema};
        use parquet::arrow::ArrowWriter;

        let text = |values: [&str; 2]| -> ArrayRef {
            Arc::new(StringArray::from(values.to_vec()))
        };
        let number = |values: [Option<f64>; 2]| -> ArrayRef {
            Arc::new(Float64Array::from(values.to_vec()))
        };
        let mut fields = vec![Field::new(ID_COLUMN, DataType::Int64, false)];
        let mut columns: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(vec![7, 8]))];
        for column in Column::ALL {
            let array = match column {
                Column::Age => number([Some(20.0), Some(23.0)]),
                Column::StudyHours => number([Some(2.5), None]),
                Column::ClassAttendance => number([Some(81.0), Some(64.5)]),
                Column::SleepHours => number([Some(7.0), Some(5.5)]),
                Column::StudyMethod => text(["coaching", "self-study"]),
                Column::Course => text(["bca", "diploma"]),
                Column::Gender => text(["female", "male"]),
                Column::FacilityRating => text(["medium", "low"]),
                Column::SleepQuality => text(["good", "poor"]),
                Column::ExamDifficulty => text(["hard", "easy"]),
                Column::InternetAccess => text(["yes", "no"]),
            };
            fields.push(Field::new(column.name(), array.data_type().clone(), true));
            columns.push(array);
        }
        fields.push(Field::new("exam_score", DataType::Float64, false));
        columns.push(number([Some(66.0), Some(41.25)]));
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.parquet");
        let mut writer =
            ArrowWriter::try_new(File::create(&path).unwrap(), batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = Table::load(&path).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column_names().len(), 13);

        let (features, targets) = get_features_and_labels(&table, "exam_score").unwrap();
        assert_eq!(targets, vec![66.0, 41.25]);
        let rows = features.rows();
        assert_eq!(rows[0].study_hours, Some(2.5));
        assert_eq!(rows[1].study_hours, None);
        assert_eq!(rows[1].course.as_deref(), Some("diploma"));
        assert_eq!(rows[1].internet_access.as_deref(), Some("no"));
    }

    #[test]
    fn test_invalid_parquet_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.parquet");
        std::fs::write(&path, "id,age\n1,2\n").unwrap();
        assert!(matches!(Table::load(&path), Err(Error::Storage(_))));
    }

    #[test]
    fn test_features_and_labels_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "id,age,exam_score\n0,20,50.0\n").unwrap();

        let table = Table::load(&path).unwrap();
        let err = get_features_and_labels(&table, "exam_score").unwrap_err();
        assert!(matches!(err, Error::Storage(msg) if msg.contains("Missing column")));
    }
}
