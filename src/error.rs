//! Error taxonomy for accessibility runs.
//!
//! Two severities exist: configuration errors abort a run before any solving
//! starts, while a `SolveFailure` is scoped to a single (batch, departure)
//! cell and only removes that cell from aggregation.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Fatal pre-flight errors. None of these should ever surface after the
/// first solver invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("unknown impedance function '{0}'")]
    UnknownImpedance(String),

    #[error("opportunity weight for feature '{feature}' is not numeric: {value}")]
    NonNumericWeight { feature: String, value: String },

    #[error("no origins to solve (input empty or nothing snapped to the network)")]
    NoOrigins,

    #[error("no impedance functions selected")]
    NoImpedanceFunctions,

    #[error("departure series is invalid: {0}")]
    InvalidDepartureSeries(String),
}

/// Why a single OD cost-matrix solve produced no usable result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The solver reported the problem infeasible (e.g. disconnected network).
    Infeasible,
    /// The solve succeeded but returned no reachable pairs.
    NoReachableDestinations,
    /// The backing service errored (HTTP failure, malformed response, ...).
    Backend(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Infeasible => write!(f, "problem infeasible"),
            FailureReason::NoReachableDestinations => write!(f, "no reachable destinations"),
            FailureReason::Backend(msg) => write!(f, "solver backend error: {msg}"),
        }
    }
}

/// A failed (batch, departure) cell. Recoverable: the orchestrator logs the
/// failure and carries on with the remaining cells.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("batch {batch_id} failed{}: {reason}", fmt_departure(.departure))]
pub struct SolveFailure {
    pub batch_id: u32,
    pub departure: Option<NaiveDateTime>,
    pub reason: FailureReason,
}

fn fmt_departure(departure: &Option<NaiveDateTime>) -> String {
    match departure {
        Some(d) => format!(" at {d}"),
        None => String::new(),
    }
}

/// Top-level error for an engine run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error("failed to write output: {0}")]
    Output(#[from] ExportError),

    #[error("worker pool setup failed: {0}")]
    Dispatch(String),
}

/// Failures while persisting results.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
}
