//! Precomputed cost-table solver.
//!
//! Serves OD costs from an explicit (origin, destination) -> minutes table.
//! Missing entries mean unreachable. Batches can be marked as failing, which
//! makes this the fault-injection backend for coverage tests as well as the
//! natural fit for externally computed matrices.

use std::collections::{HashMap, HashSet};

use crate::error::{FailureReason, SolveFailure};
use crate::model::OdPair;
use crate::traits::{OdMatrixSolver, OdProblem};

#[derive(Debug, Clone, Default)]
pub struct CostTableSolver {
    costs: HashMap<(String, String), f64>,
    failing_batches: HashSet<u32>,
}

impl CostTableSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the travel cost in minutes for one OD pair.
    pub fn with_cost(mut self, origin: &str, destination: &str, minutes: f64) -> Self {
        self.costs
            .insert((origin.to_string(), destination.to_string()), minutes);
        self
    }

    /// Force every solve for the given batch id to fail.
    pub fn with_failing_batch(mut self, batch_id: u32) -> Self {
        self.failing_batches.insert(batch_id);
        self
    }
}

impl OdMatrixSolver for CostTableSolver {
    fn solve(&self, problem: &OdProblem<'_>) -> Result<Vec<OdPair>, SolveFailure> {
        if self.failing_batches.contains(&problem.batch_id) {
            return Err(SolveFailure {
                batch_id: problem.batch_id,
                departure: problem.departure,
                reason: FailureReason::Infeasible,
            });
        }

        let mut pairs = Vec::new();
        for origin in problem.origins {
            for destination in problem.destinations {
                let key = (origin.id_text.clone(), destination.id_text.clone());
                let Some(&minutes) = self.costs.get(&key) else {
                    continue;
                };
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
