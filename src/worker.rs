//! Per-batch OD cost-matrix worker.
//!
//! One worker handles one (batch, departure) cell: it builds an isolated OD
//! problem from the batch's origins and the full destination set, invokes the
//! solver, and condenses the returned pair list into per-origin accessibility
//! sums. Workers share nothing mutable; inputs arrive by reference and the
//! output is owned by the worker until the aggregation barrier.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::SolveFailure;
use crate::impedance::ImpedanceFunction;
use crate::model::{AccessibilityRecord, DestinationPoint, OdPair, OriginPoint};
use crate::traits::{OdMatrixSolver, OdProblem};

/// Run-constant worker parameters.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub travel_mode: String,
    pub cutoff: Option<f64>,
    /// Discard pairs where origin and destination are the same feature.
    /// Meaningful when one feature set serves as both sides and a self-trip
    /// should not count as access.
    pub drop_self_pairs: bool,
}

/// Everything one (batch, departure) solve produced.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub batch_id: u32,
    pub departure: Option<NaiveDateTime>,
    /// Raw OD pairs after self-pair filtering; the time-series store
    /// persists these verbatim.
    pub pairs: Vec<OdPair>,
    /// Per-origin sums, one entry per origin present in the solver output.
    pub records: Vec<AccessibilityRecord>,
}

/// Solve one batch against the full destination set and aggregate.
///
/// `origins` must already be filtered to the batch. Failure is returned to
/// the dispatcher; it never panics across the worker boundary.
pub fn solve_batch<S: OdMatrixSolver + ?Sized>(
    batch_id: u32,
    origins: &[OriginPoint],
    destinations: &[DestinationPoint],
    solver: &S,
    functions: &[ImpedanceFunction],
    options: &WorkerOptions,
    departure: Option<NaiveDateTime>,
) -> Result<BatchOutput, SolveFailure> {
    let problem = OdProblem {
        batch_id,
        origins,
        destinations,
        travel_mode: &options.travel_mode,
        cutoff: options.cutoff,
        departure,
    };

    let mut pairs = solver.solve(&problem)?;

    if options.drop_self_pairs {
        pairs.retain(|pair| pair.origin != pair.destination);
    }

    debug!(
        batch = batch_id,
        pairs = pairs.len(),
        "OD matrix solved, summarizing accessibility"
    );

    let weights: HashMap<&str, f64> = destinations
        .iter()
        .map(|d| (d.id_text.as_str(), d.weight))
        .collect();

    let mut sums: HashMap<&str, (Vec<f64>, u64)> = HashMap::new();
    for pair in &pairs {
        // pairs referencing unknown destinations would be a solver bug;
        // weightless pairs contribute nothing either way
        let Some(&weight) = weights.get(pair.destination.as_str()) else {
            continue;
        };
        let entry = sums
            .entry(pair.origin.as_str())
            .or_insert_with(|| (vec![0.0; functions.len()], 0));
        for (score, function) in entry.0.iter_mut().zip(functions) {
            *score += weight * function.eval(pair.total_time);
        }
        entry.1 += 1;
    }

    // emit in batch origin order so output is deterministic
    let records = origins
        .iter()
        .filter_map(|origin| {
            sums.remove(origin.id_text.as_str())
                .map(|(scores, frequency)| AccessibilityRecord {
                    origin: origin.id_text.clone(),
                    scores,
                    frequency,
                    departure,
                })
        })
        .collect();

    Ok(BatchOutput {
        batch_id,
        departure,
        pairs,
        records,
    })
}
