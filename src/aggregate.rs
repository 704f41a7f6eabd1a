//! Merging per-batch worker outputs into one dataset.
//!
//! Concatenates surviving batch outputs, zero-fills covered origins that had
//! no reachable destination, re-attaches original identifiers via the
//! batch-stable text id, computes run coverage, and optionally joins the
//! accessibility sums back onto the origin input. Merging is pure: the same
//! worker outputs always merge to the same record set.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::error::SolveFailure;
use crate::impedance::ImpedanceFunction;
use crate::model::{FieldValue, OriginPoint};
use crate::worker::BatchOutput;

/// One merged output row, original identifier re-attached.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub origin_id: FieldValue,
    pub origin_text: String,
    /// Parallel to the selected impedance functions; all-zero when the
    /// origin reached nothing.
    pub scores: Vec<f64>,
    pub frequency: u64,
    pub departure: Option<NaiveDateTime>,
}

/// The merged dataset for one departure slice.
#[derive(Debug, Clone)]
pub struct AccessDataset {
    /// Output column names, `Ai_<function>`.
    pub columns: Vec<String>,
    pub records: Vec<MergedRecord>,
}

/// Whether every origin made it into the final output, and if not, why.
#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    pub origins_total: usize,
    pub origins_covered: usize,
    /// (batch id, departure) cells dropped after a solve failure.
    pub failed_cells: Vec<(u32, Option<NaiveDateTime>)>,
    /// Text ids of origins no surviving batch produced.
    pub uncovered: Vec<String>,
}

impl CoverageReport {
    pub fn is_partial(&self) -> bool {
        self.origins_covered < self.origins_total
    }
}

/// Accessibility columns joined back onto an original origin row.
///
/// Covered origins always carry `Some` scores (zero-access origins included,
/// with 0.0); origins lost to a failed batch carry `None`. The two cases are
/// deliberately distinguishable in output.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedOriginRow {
    pub id: FieldValue,
    pub id_text: String,
    pub scores: Vec<Option<f64>>,
    pub frequency: Option<u64>,
}

/// Result of merging one departure slice.
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub dataset: AccessDataset,
    pub coverage: CoverageReport,
    /// Present when join-back was requested; one row per input origin, in
    /// input order.
    pub joined: Option<Vec<JoinedOriginRow>>,
}

/// Merge the surviving worker outputs for one departure slice.
///
/// `origins` is the full batch-tagged origin set; `failures` are the cells
/// the dispatcher dropped for this slice.
pub fn merge(
    outputs: &[BatchOutput],
    failures: &[SolveFailure],
    origins: &[OriginPoint],
    functions: &[ImpedanceFunction],
    join_back: bool,
) -> MergeResult {
    let columns: Vec<String> = functions.iter().map(|f| f.column_name()).collect();

    let solved_batches: HashSet<u32> = outputs.iter().map(|o| o.batch_id).collect();
    let id_by_text: HashMap<&str, &FieldValue> = origins
        .iter()
        .map(|o| (o.id_text.as_str(), &o.id))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut records: Vec<MergedRecord> = Vec::new();
    for output in outputs {
        for record in &output.records {
            if !seen.insert(record.origin.as_str()) {
                // same origin twice means the same output was merged twice;
                // keep the first
                continue;
            }
            let origin_id = id_by_text
                .get(record.origin.as_str())
                .map(|id| (*id).clone())
                .unwrap_or(FieldValue::Null);
            records.push(MergedRecord {
                origin_id,
                origin_text: record.origin.clone(),
                scores: record.scores.clone(),
                frequency: record.frequency,
                departure: record.departure,
            });
        }
    }

    // post-merge reconciliation: origins of successful batches that reached
    // nothing still get a record, with zero values rather than nulls
    let slice_departure = outputs
        .first()
        .map(|o| o.departure)
        .unwrap_or_default();
    for origin in origins {
        if solved_batches.contains(&origin.batch_id) && !seen.contains(origin.id_text.as_str()) {
            records.push(MergedRecord {
                origin_id: origin.id.clone(),
                origin_text: origin.id_text.clone(),
                scores: vec![0.0; functions.len()],
                frequency: 0,
                departure: slice_departure,
            });
        }
    }

    let covered: HashSet<&str> = records.iter().map(|r| r.origin_text.as_str()).collect();
    let uncovered: Vec<String> = origins
        .iter()
        .filter(|o| !covered.contains(o.id_text.as_str()))
        .map(|o| o.id_text.clone())
        .collect();

    let coverage = CoverageReport {
        origins_total: origins.len(),
        origins_covered: origins.len() - uncovered.len(),
        failed_cells: failures
            .iter()
            .map(|f| (f.batch_id, f.departure))
            .collect(),
        uncovered,
    };

    info!(
        origins = coverage.origins_total,
        covered = coverage.origins_covered,
        failed_cells = coverage.failed_cells.len(),
        "merged batch outputs"
    );
    if join_back && coverage.is_partial() {
        warn!(
            uncovered = coverage.uncovered.len(),
            "partial coverage: some origins appear in no surviving batch"
        );
    }

    let joined = join_back.then(|| {
        let by_text: HashMap<&str, &MergedRecord> = records
            .iter()
            .map(|r| (r.origin_text.as_str(), r))
            .collect();
        origins
            .iter()
            .map(|origin| match by_text.get(origin.id_text.as_str()) {
                Some(record) => JoinedOriginRow {
                    id: origin.id.clone(),
                    id_text: origin.id_text.clone(),
                    scores: record.scores.iter().map(|&s| Some(s)).collect(),
                    frequency: Some(record.frequency),
                },
                None => JoinedOriginRow {
                    id: origin.id.clone(),
                    id_text: origin.id_text.clone(),
                    scores: vec![None; functions.len()],
                    frequency: None,
                },
            })
            .collect()
    });

    MergeResult {
        dataset: AccessDataset { columns, records },
        coverage,
        joined,
    }
}
