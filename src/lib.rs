//! access-engine: batched origin-destination accessibility scoring.
//!
//! Partitions origins into spatially coherent batches, drives OD cost-matrix
//! solves through a pluggable solver backend (optionally across a series of
//! departure times), applies impedance functions to each reachable pair, and
//! merges per-origin accessibility sums into parquet output.

pub mod aggregate;
pub mod batch;
pub mod engine;
pub mod error;
pub mod export;
pub mod haversine;
pub mod impedance;
pub mod model;
pub mod osrm;
pub mod resolve;
pub mod table;
pub mod traits;
pub mod worker;
