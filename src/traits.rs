//! Core capability traits for the accessibility engine.
//!
//! These are intentionally minimal and backend-agnostic. The engine consumes
//! OD cost matrices, it does not compute them: any in-process router, external
//! routing service, or precomputed table can sit behind [`OdMatrixSolver`].

use chrono::NaiveDateTime;

use crate::error::SolveFailure;
use crate::model::{DestinationPoint, NetworkLocation, OdPair, OriginPoint};

/// One isolated OD cost-matrix problem: the origins of a single batch against
/// the full destination set.
#[derive(Debug, Clone)]
pub struct OdProblem<'a> {
    pub batch_id: u32,
    pub origins: &'a [OriginPoint],
    pub destinations: &'a [DestinationPoint],
    /// Travel mode identifier, interpreted by the solver backend.
    pub travel_mode: &'a str,
    /// Maximum travel cost in minutes; pairs beyond it must not be returned.
    pub cutoff: Option<f64>,
    /// Departure time for time-dependent backends; `None` = time-invariant.
    pub departure: Option<NaiveDateTime>,
}

/// Solves OD cost-matrix problems.
///
/// On success the returned pair list holds travel cost in minutes for every
/// reachable (origin, destination) pair within the cutoff; unreachable pairs
/// are absent. A failure is scoped to the problem's (batch, departure) cell.
pub trait OdMatrixSolver: Sync {
    fn solve(&self, problem: &OdProblem<'_>) -> Result<Vec<OdPair>, SolveFailure>;
}

/// Snaps a point onto the network within a search tolerance.
///
/// Returns `None` when no network element lies within tolerance; such
/// features are dropped from the run (and counted) during preprocessing.
pub trait NetworkLocator {
    fn locate(&self, point: (f64, f64)) -> Option<NetworkLocation>;
}

/// Ordering strategy for batch assignment.
///
/// The order in which origins are tagged with batch ids is the engine's
/// load-balancing mechanism: spatially adjacent origins sharing a batch visit
/// overlapping destination neighborhoods, which keeps solver effort even
/// across workers. Alternate orderings can be substituted here.
pub trait OriginOrdering {
    /// Sort keys for the given origins, one per origin in input order;
    /// origins are batched in ascending key order. Implementations may use
    /// the full slice to establish context (e.g. a bounding box) before
    /// ranking individual points.
    fn rank(&self, origins: &[OriginPoint]) -> Vec<u64>;
}
