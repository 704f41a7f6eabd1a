//! Shared fixtures for access-engine integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, Float64Array, StringArray, UInt64Array};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use access_engine::engine::{DepartureSpec, EngineConfig, OrderingStrategy};
use access_engine::model::{FieldValue, Geometry, RawFeature};
use access_engine::resolve::VertexSnapLocator;
use access_engine::table::CostTableSolver;

pub fn origin_feature(id: &str) -> RawFeature {
    // identical locations keep batch assignment in input order, so tests can
    // reason about batch membership without depending on curve geometry
    RawFeature::new(FieldValue::Text(id.to_string()), Geometry::Point((0.0, 0.0)))
}

pub fn destination_feature(id: &str, weight: f64) -> RawFeature {
    RawFeature::new(FieldValue::Text(id.to_string()), Geometry::Point((0.0, 0.0)))
        .with_weight(FieldValue::Float(weight))
}

pub fn permissive_locator() -> VertexSnapLocator {
    VertexSnapLocator::permissive()
}

/// Scenario A: 3 origins, 2 destinations with weights 10 and 20, pure
/// inverse impedance, hand-computable sums:
///
///   o1: 10/1 + 20/2  = 20
///   o2: 10/2 + 20/4  = 10
///   o3: 10/5 + 20/10 = 4
pub fn scenario_a_solver() -> CostTableSolver {
    CostTableSolver::new()
        .with_cost("o1", "d1", 1.0)
        .with_cost("o1", "d2", 2.0)
        .with_cost("o2", "d1", 2.0)
        .with_cost("o2", "d2", 4.0)
        .with_cost("o3", "d1", 5.0)
        .with_cost("o3", "d2", 10.0)
}

pub fn scenario_a_origins() -> Vec<RawFeature> {
    vec![
        origin_feature("o1"),
        origin_feature("o2"),
        origin_feature("o3"),
    ]
}

pub fn scenario_a_destinations() -> Vec<RawFeature> {
    vec![
        destination_feature("d1", 10.0),
        destination_feature("d2", 20.0),
    ]
}

pub fn scenario_a_expected() -> Vec<(&'static str, f64)> {
    vec![("o1", 20.0), ("o2", 10.0), ("o3", 4.0)]
}

pub fn base_config(output_dir: &Path) -> EngineConfig {
    EngineConfig {
        travel_mode: "drive".to_string(),
        cutoff: None,
        departures: DepartureSpec::None,
        impedance_functions: vec!["POW1_0".to_string()],
        batch_size_factor: 500,
        output_dir: output_dir.to_path_buf(),
        output_name: "access".to_string(),
        drop_self_pairs: false,
        join_back: false,
        workers: Some(2),
        ordering: OrderingStrategy::Hilbert,
        write_od_matrix: false,
    }
}

/// One row of a written accessibility table.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRow {
    pub i_id: String,
    pub scores: Vec<f64>,
    pub frequency: u64,
}

/// Read back an accessibility table, sorted by origin id.
pub fn read_access_table(path: &Path) -> Vec<AccessRow> {
    let file = File::open(path).expect("open parquet table");
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .expect("parquet reader")
        .build()
        .expect("parquet record batches");

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.expect("record batch");
        let score_columns = batch.num_columns() - 2;
        let ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("i_id column");
        let frequencies = batch
            .column(score_columns + 1)
            .as_any()
            .downcast_ref::<UInt64Array>()
            .expect("frequency column");
        for row in 0..batch.num_rows() {
            let mut scores = Vec::with_capacity(score_columns);
            for column in 1..=score_columns {
                let values = batch
                    .column(column)
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .expect("Ai column");
                scores.push(values.value(row));
            }
            rows.push(AccessRow {
                i_id: ids.value(row).to_string(),
                scores,
                frequency: frequencies.value(row),
            });
        }
    }
    rows.sort_by(|a, b| a.i_id.cmp(&b.i_id));
    rows
}

/// One raw OD line read back from the partitioned store.
#[derive(Debug, Clone, PartialEq)]
pub struct OdLine {
    pub i_id: String,
    pub j_id: String,
    pub total_time: f64,
    pub start_datetime: String,
}

/// Read every OD line under one partition directory, sorted by (i, j).
pub fn read_partition(dir: &Path) -> Vec<OdLine> {
    let mut lines = Vec::new();
    let entries = std::fs::read_dir(dir).expect("partition dir");
    for entry in entries {
        let path = entry.expect("dir entry").path();
        if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
            continue;
        }
        let file = File::open(&path).expect("open partition file");
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .expect("parquet reader")
            .build()
            .expect("parquet record batches");
        for batch in reader {
            let batch = batch.expect("record batch");
            let i_ids = batch
                .column(0)
                .as_any()
                .downcast_ref::<StringArray>()
                .expect("i_id");
            let j_ids = batch
                .column(1)
                .as_any()
                .downcast_ref::<StringArray>()
                .expect("j_id");
            let times = batch
                .column(2)
                .as_any()
                .downcast_ref::<Float64Array>()
                .expect("total_time");
            let labels = batch
                .column(4)
                .as_any()
                .downcast_ref::<StringArray>()
                .expect("start_datetime");
            for row in 0..batch.num_rows() {
                lines.push(OdLine {
                    i_id: i_ids.value(row).to_string(),
                    j_id: j_ids.value(row).to_string(),
                    total_time: times.value(row),
                    start_datetime: labels.value(row).to_string(),
                });
            }
        }
    }
    lines.sort_by(|a, b| (&a.i_id, &a.j_id).cmp(&(&b.i_id, &b.j_id)));
    lines
}
