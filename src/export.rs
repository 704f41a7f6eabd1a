//! Parquet persistence for accessibility output.
//!
//! Two shapes: a single accessibility table keyed by origin id (one `Ai_*`
//! column per impedance function), and a timestamp-partitioned OD matrix
//! store for time-series runs, laid out hive-style as
//! `start_datetime=<label>/batch_<n>.parquet` under the store root.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use parquet::arrow::ArrowWriter;
use tracing::info;

use crate::aggregate::{AccessDataset, JoinedOriginRow};
use crate::error::ExportError;
use crate::worker::BatchOutput;

fn utf8_field(name: &str) -> Field {
    Field::new(name, DataType::Utf8, false)
}

fn f64_field(name: &str) -> Field {
    Field::new(name, DataType::Float64, false)
}

fn nullable_f64_field(name: &str) -> Field {
    Field::new(name, DataType::Float64, true)
}

fn write_record_batch<P: AsRef<Path>>(
    path: P,
    schema: Schema,
    arrays: Vec<ArrayRef>,
) -> Result<(), ExportError> {
    let schema = Arc::new(schema);
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Partition directory label for a departure time.
pub fn partition_label(departure: NaiveDateTime) -> String {
    departure.format("%Y_%m_%d-%H_%M_%S").to_string()
}

/// Write the merged accessibility table: `i_id`, one `Ai_*` column per
/// selected function, and the contributing-pair count.
pub fn write_access_table<P: AsRef<Path>>(
    path: P,
    dataset: &AccessDataset,
) -> Result<(), ExportError> {
    let mut fields = vec![utf8_field("i_id")];
    fields.extend(dataset.columns.iter().map(|c| f64_field(c)));
    fields.push(Field::new("frequency", DataType::UInt64, false));

    let ids: Vec<&str> = dataset
        .records
        .iter()
        .map(|r| r.origin_text.as_str())
        .collect();
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(ids))];
    for (column_index, _) in dataset.columns.iter().enumerate() {
        let values: Vec<f64> = dataset
            .records
            .iter()
            .map(|r| r.scores[column_index])
            .collect();
        arrays.push(Arc::new(Float64Array::from(values)));
    }
    let frequencies: Vec<u64> = dataset.records.iter().map(|r| r.frequency).collect();
    arrays.push(Arc::new(UInt64Array::from(frequencies)));

    write_record_batch(&path, Schema::new(fields), arrays)?;
    info!(
        records = dataset.records.len(),
        path = %path.as_ref().display(),
        "wrote accessibility table"
    );
    Ok(())
}

/// Write origin rows with joined-back accessibility columns. Uncovered
/// origins carry nulls, zero-access origins carry zeros.
pub fn write_joined_origins<P: AsRef<Path>>(
    path: P,
    columns: &[String],
    rows: &[JoinedOriginRow],
) -> Result<(), ExportError> {
    let mut fields = vec![utf8_field("i_id")];
    fields.extend(columns.iter().map(|c| nullable_f64_field(c)));
    fields.push(Field::new("frequency", DataType::UInt64, true));

    let ids: Vec<&str> = rows.iter().map(|r| r.id_text.as_str()).collect();
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(ids))];
    for (column_index, _) in columns.iter().enumerate() {
        let values: Vec<Option<f64>> = rows.iter().map(|r| r.scores[column_index]).collect();
        arrays.push(Arc::new(Float64Array::from(values)));
    }
    let frequencies: Vec<Option<u64>> = rows.iter().map(|r| r.frequency).collect();
    arrays.push(Arc::new(UInt64Array::from(frequencies)));

    write_record_batch(path, Schema::new(fields), arrays)
}

/// Timestamp-partitioned store of raw OD lines.
///
/// Each departure slice lands in its own partition directory; repeated
/// invocations accumulate partitions instead of overwriting prior slices.
#[derive(Debug, Clone)]
pub struct OdMatrixStore {
    root: PathBuf,
}

impl OdMatrixStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for one partition label.
    pub fn partition_dir(&self, label: &str) -> PathBuf {
        self.root.join(format!("start_datetime={label}"))
    }

    /// Persist one slice's batch outputs as `batch_<n>.parquet` files under
    /// the slice's partition directory. Returns the files written.
    pub fn write_slice(
        &self,
        label: &str,
        outputs: &[BatchOutput],
    ) -> Result<Vec<PathBuf>, ExportError> {
        let dir = self.partition_dir(label);
        std::fs::create_dir_all(&dir)?;

        let mut written = Vec::with_capacity(outputs.len());
        for output in outputs {
            let schema = Schema::new(vec![
                utf8_field("i_id"),
                utf8_field("j_id"),
                f64_field("total_time"),
                Field::new("batch_id", DataType::UInt32, false),
                utf8_field("start_datetime"),
            ]);

            let origins: Vec<&str> = output.pairs.iter().map(|p| p.origin.as_str()).collect();
            let destinations: Vec<&str> =
                output.pairs.iter().map(|p| p.destination.as_str()).collect();
            let times: Vec<f64> = output.pairs.iter().map(|p| p.total_time).collect();
            let batch_ids = vec![output.batch_id; output.pairs.len()];
            let labels = vec![label; output.pairs.len()];

            let arrays: Vec<ArrayRef> = vec![
                Arc::new(StringArray::from(origins)),
                Arc::new(StringArray::from(destinations)),
                Arc::new(Float64Array::from(times)),
                Arc::new(UInt32Array::from(batch_ids)),
                Arc::new(StringArray::from(labels)),
            ];

            let path = dir.join(format!("batch_{}.parquet", output.batch_id));
            write_record_batch(&path, schema, arrays)?;
            written.push(path);
        }

        info!(
            label,
            batches = written.len(),
            root = %self.root.display(),
            "wrote OD matrix partition"
        );
        Ok(written)
    }
}
