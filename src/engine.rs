//! Run orchestration: preprocessing, batching, parallel dispatch, merge.
//!
//! The engine drives one accessibility run end to end. Configuration errors
//! abort before the first solve; per-cell solve failures are logged, dropped
//! from aggregation, and reported in the run summary. Workers for one
//! departure slice run in parallel on a bounded rayon pool and the engine
//! waits on the whole round before aggregating that slice.

use std::path::PathBuf;

use chrono::{Duration, NaiveDateTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::{self, CoverageReport, JoinedOriginRow};
use crate::batch::{self, HilbertOrdering, IdHashOrdering};
use crate::error::{ConfigurationError, EngineError, SolveFailure};
use crate::export::{self, OdMatrixStore};
use crate::impedance::ImpedanceFunction;
use crate::model::{OriginPoint, RawFeature};
use crate::resolve;
use crate::traits::{NetworkLocator, OdMatrixSolver, OriginOrdering};
use crate::worker::{self, BatchOutput, WorkerOptions};

/// Departure time selection for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DepartureSpec {
    /// Time-invariant solve.
    None,
    /// One fixed departure.
    At(NaiveDateTime),
    /// A series of departures: start, then every `step_minutes` until `end`
    /// is reached (the first slice at or past `end` is included).
    Series {
        start: NaiveDateTime,
        end: NaiveDateTime,
        step_minutes: u32,
    },
}

impl DepartureSpec {
    /// Expand into concrete slices; `None` yields a single time-invariant
    /// slice.
    pub fn slices(&self) -> Result<Vec<Option<NaiveDateTime>>, ConfigurationError> {
        match self {
            DepartureSpec::None => Ok(vec![None]),
            DepartureSpec::At(t) => Ok(vec![Some(*t)]),
            DepartureSpec::Series {
                start,
                end,
                step_minutes,
            } => {
                if *step_minutes == 0 {
                    return Err(ConfigurationError::InvalidDepartureSeries(
                        "step must be positive".to_string(),
                    ));
                }
                if end < start {
                    return Err(ConfigurationError::InvalidDepartureSeries(format!(
                        "end {end} precedes start {start}"
                    )));
                }
                let step = Duration::minutes(i64::from(*step_minutes));
                let mut slices = vec![Some(*start)];
                let mut t = *start;
                while t < *end {
                    t += step;
                    slices.push(Some(t));
                }
                Ok(slices)
            }
        }
    }
}

/// Origin ordering strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderingStrategy {
    #[default]
    Hilbert,
    IdHash,
}

/// Full parameter set for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub travel_mode: String,
    /// Travel cost cutoff in minutes.
    pub cutoff: Option<f64>,
    pub departures: DepartureSpec,
    /// Ordered impedance preset names; one output column each.
    pub impedance_functions: Vec<String>,
    /// Soft cap on origins per batch.
    pub batch_size_factor: usize,
    pub output_dir: PathBuf,
    /// Stem for output files and the OD store directory.
    pub output_name: String,
    pub drop_self_pairs: bool,
    /// Join accessibility sums back onto the origin input rows.
    pub join_back: bool,
    /// Worker override; defaults to logical cores minus one.
    pub workers: Option<usize>,
    pub ordering: OrderingStrategy,
    /// Persist raw OD lines to the timestamp-partitioned store.
    pub write_od_matrix: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            travel_mode: "drive".to_string(),
            cutoff: None,
            departures: DepartureSpec::None,
            impedance_functions: vec!["HN1997".to_string()],
            batch_size_factor: 500,
            output_dir: PathBuf::from("."),
            output_name: "access".to_string(),
            drop_self_pairs: false,
            join_back: false,
            workers: None,
            ordering: OrderingStrategy::Hilbert,
            write_od_matrix: false,
        }
    }
}

/// Outcome of one departure slice.
#[derive(Debug, Clone)]
pub struct SliceSummary {
    pub departure: Option<NaiveDateTime>,
    pub coverage: CoverageReport,
    pub access_table: Option<PathBuf>,
}

/// Outcome of a whole run.
#[derive(Debug)]
pub struct RunSummary {
    pub slices: Vec<SliceSummary>,
    /// Join-back rows; present for single-slice runs with `join_back` set.
    pub joined: Option<Vec<JoinedOriginRow>>,
    /// Path to the joined-origins table, when written.
    pub joined_table: Option<PathBuf>,
    /// OD matrix store root, when raw lines were persisted.
    pub od_store: Option<PathBuf>,
}

impl RunSummary {
    /// True when every origin was covered in every slice.
    pub fn fully_covered(&self) -> bool {
        self.slices.iter().all(|s| !s.coverage.is_partial())
    }
}

/// Run one accessibility job end to end.
pub fn run<L, S>(
    config: &EngineConfig,
    origin_features: &[RawFeature],
    destination_features: &[RawFeature],
    locator: &L,
    solver: &S,
) -> Result<RunSummary, EngineError>
where
    L: NetworkLocator,
    S: OdMatrixSolver,
{
    // -- validation: everything that can fail does so before solving --
    let functions = ImpedanceFunction::from_names(&config.impedance_functions)?;
    let slices = config.departures.slices()?;

    let (destinations, _) = resolve::resolve_destinations(destination_features, locator)?;
    let (mut origins, _) = resolve::resolve_origins(origin_features, locator);
    if origins.is_empty() {
        return Err(ConfigurationError::NoOrigins.into());
    }

    // -- batching --
    let workers = config.workers.unwrap_or_else(batch::default_worker_count);
    let batch_size = batch::plan_batch_size(origins.len(), workers, config.batch_size_factor);
    let ordering: &dyn OriginOrdering = match config.ordering {
        OrderingStrategy::Hilbert => &HilbertOrdering,
        OrderingStrategy::IdHash => &IdHashOrdering,
    };
    let batch_count = batch::assign_batches(&mut origins, ordering, batch_size);
    info!(
        workers,
        batch_size, batch_count, slices = slices.len(), "dispatching OD cost-matrix solves"
    );

    let options = WorkerOptions {
        travel_mode: config.travel_mode.clone(),
        cutoff: config.cutoff,
        drop_self_pairs: config.drop_self_pairs,
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|err| EngineError::Dispatch(err.to_string()))?;

    std::fs::create_dir_all(&config.output_dir)
        .map_err(|err| EngineError::Output(err.into()))?;
    let multi_slice = slices.len() > 1;
    let od_store = config
        .write_od_matrix
        .then(|| OdMatrixStore::new(config.output_dir.join(format!("{}_odcm", config.output_name))));

    let batches = batch_ranges(&origins);
    let mut slice_summaries = Vec::with_capacity(slices.len());
    let mut joined = None;
    let mut joined_table = None;

    for departure in slices {
        // one dispatch round per slice; the pool blocks until every cell in
        // the round has completed or failed
        let results: Vec<Result<BatchOutput, SolveFailure>> = pool.install(|| {
            batches
                .par_iter()
                .map(|(batch_id, range)| {
                    worker::solve_batch(
                        *batch_id,
                        &origins[range.clone()],
                        &destinations,
                        solver,
                        &functions,
                        &options,
                        departure,
                    )
                })
                .collect()
        });

        let mut outputs = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(output) => outputs.push(output),
                Err(failure) => {
                    warn!(%failure, "skipping failed batch");
                    failures.push(failure);
                }
            }
        }

        let merged = aggregate::merge(&outputs, &failures, &origins, &functions, config.join_back);

        let label = departure
            .map(export::partition_label)
            .unwrap_or_else(|| "unspecified".to_string());
        if let Some(store) = &od_store {
            store.write_slice(&label, &outputs)?;
        }

        let table_name = if multi_slice {
            format!("{}_{}.parquet", config.output_name, label)
        } else {
            format!("{}.parquet", config.output_name)
        };
        let table_path = config.output_dir.join(table_name);
        export::write_access_table(&table_path, &merged.dataset)?;

        if config.join_back && !multi_slice {
            if let Some(rows) = &merged.joined {
                let path = config
                    .output_dir
                    .join(format!("{}_origins.parquet", config.output_name));
                export::write_joined_origins(&path, &merged.dataset.columns, rows)?;
                joined_table = Some(path);
            }
            joined = merged.joined;
        } else if config.join_back && multi_slice {
            warn!("join-back is only written for single-slice runs; skipping");
        }

        info!(
            slice = %label,
            covered = merged.coverage.origins_covered,
            total = merged.coverage.origins_total,
            "slice complete"
        );
        slice_summaries.push(SliceSummary {
            departure,
            coverage: merged.coverage,
            access_table: Some(table_path),
        });
    }

    Ok(RunSummary {
        slices: slice_summaries,
        joined,
        joined_table,
        od_store: od_store.map(|s| s.root().to_path_buf()),
    })
}

/// Contiguous index ranges per batch id. Valid because `assign_batches`
/// leaves origins sorted by batch.
fn batch_ranges(origins: &[OriginPoint]) -> Vec<(u32, std::ops::Range<usize>)> {
    let mut ranges: Vec<(u32, std::ops::Range<usize>)> = Vec::new();
    for (index, origin) in origins.iter().enumerate() {
        match ranges.last_mut() {
            Some((batch_id, range)) if *batch_id == origin.batch_id => {
                range.end = index + 1;
            }
            _ => ranges.push((origin.batch_id, index..index + 1)),
        }
    }
    ranges
}
