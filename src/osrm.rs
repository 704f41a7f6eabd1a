//! OSRM HTTP adapter for OD cost matrices.
//!
//! Queries the `/table` service with explicit source/destination index lists
//! so origins and destinations stay distinct sets. OSRM durations come back
//! in seconds and are converted to minutes; `null` durations (unroutable
//! pairs) and pairs beyond the cutoff are omitted from the result.

use serde::Deserialize;
use tracing::debug;

use crate::error::{FailureReason, SolveFailure};
use crate::model::OdPair;
use crate::traits::{OdMatrixSolver, OdProblem};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    /// OSRM routing profile; falls back to the problem's travel mode when the
    /// problem names one.
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmSolver {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmSolver {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn failure(problem: &OdProblem<'_>, reason: FailureReason) -> SolveFailure {
        SolveFailure {
            batch_id: problem.batch_id,
            departure: problem.departure,
            reason,
        }
    }
}

impl OdMatrixSolver for OsrmSolver {
    fn solve(&self, problem: &OdProblem<'_>) -> Result<Vec<OdPair>, SolveFailure> {
        if problem.origins.is_empty() || problem.destinations.is_empty() {
            return Err(Self::failure(problem, FailureReason::Infeasible));
        }
        if problem.departure.is_some() {
            // OSRM tables are time-invariant
            debug!(batch = problem.batch_id, "OSRM ignores departure time");
        }

        let profile = if problem.travel_mode.is_empty() {
            self.config.profile.as_str()
        } else {
            problem.travel_mode
        };

        let coords = problem
            .origins
            .iter()
            .map(|o| o.location)
            .chain(problem.destinations.iter().map(|d| d.location))
            .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
            .collect::<Vec<_>>()
            .join(";");

        let sources = (0..problem.origins.len())
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(";");
        let destinations = (0..problem.destinations.len())
            .map(|i| (problem.origins.len() + i).to_string())
            .collect::<Vec<_>>()
            .join(";");

        let url = format!(
            "{}/table/v1/{}/{}?sources={}&destinations={}&annotations=duration",
            self.config.base_url, profile, coords, sources, destinations
        );

        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())
            .map_err(|err| Self::failure(problem, FailureReason::Backend(err.to_string())))?;

        if body.code != "Ok" {
            return Err(Self::failure(problem, FailureReason::Backend(body.code)));
        }
        let Some(durations) = body.durations else {
            return Err(Self::failure(
                problem,
                FailureReason::NoReachableDestinations,
            ));
        };

        let mut pairs = Vec::new();
        for (i, row) in durations.iter().enumerate() {
            let Some(origin) = problem.origins.get(i) else {
                break;
            };
            for (j, duration) in row.iter().enumerate() {
                let (Some(destination), Some(seconds)) = (problem.destinations.get(j), duration)
                else {
                    continue;
                };
                let minutes = seconds / 60.0;
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

        if pairs.is_empty() {
            return Err(Self::failure(
                problem,
                FailureReason::NoReachableDestinations,
            ));
        }
        Ok(pairs)
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    #[serde(default)]
    code: String,
    durations: Option<Vec<Vec<Option<f64>>>>,
}
