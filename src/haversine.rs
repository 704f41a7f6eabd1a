//! Haversine OD cost-matrix solver (fallback when no router is available).
//!
//! Uses great-circle distance to estimate travel time.
//! Less accurate than a network solve (ignores roads) but always feasible.

use crate::error::SolveFailure;
use crate::model::OdPair;
use crate::traits::{OdMatrixSolver, OdProblem};

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two (lat, lng) points in kilometers.
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Haversine-based OD solver.
///
/// Estimates travel time from straight-line distance at an assumed speed.
/// Ignores the departure time (the estimate is time-invariant) and honors
/// the problem cutoff by omitting pairs beyond it.
#[derive(Debug, Clone)]
pub struct HaversineSolver {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineSolver {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineSolver {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Convert distance in km to travel time in minutes.
    fn km_to_minutes(&self, km: f64) -> f64 {
        km / self.speed_kmh * 60.0
    }
}

impl OdMatrixSolver for HaversineSolver {
    fn solve(&self, problem: &OdProblem<'_>) -> Result<Vec<OdPair>, SolveFailure> {
        let mut pairs =
            Vec::with_capacity(problem.origins.len() * problem.destinations.len());

        for origin in problem.origins {
            for destination in problem.destinations {
                let km = haversine_km(origin.location, destination.location);
                let minutes = self.km_to_minutes(km);
                if let Some(cutoff) = problem.cutoff {
                    if minutes > cutoff {
                        continue;
                    }
                }
                pairs.push(OdPair {
                    origin: origin.id_text.clone(),
                    destination: destination.id_text.clone(),
                    total_time: minutes,
                });
            }
        }

        Ok(pairs)
    }
}
