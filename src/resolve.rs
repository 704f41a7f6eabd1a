//! Preprocessing: raw features to network-bound origin and destination points.
//!
//! Reduces non-point geometry to a representative point, validates and
//! filters opportunity weights, retains a text copy of every identifier for
//! round-tripping, and snaps each point onto the network via the configured
//! [`NetworkLocator`]. Destinations with non-positive weight are dropped
//! before snapping; they cannot contribute to any accessibility sum, so
//! matching them would only waste solver time.

use tracing::{info, warn};

use crate::error::ConfigurationError;
use crate::haversine::haversine_km;
use crate::model::{
    DestinationPoint, FieldValue, NetworkLocation, OriginPoint, RawFeature,
};
use crate::traits::NetworkLocator;

/// What happened to one side of the input during preprocessing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub input: usize,
    pub resolved: usize,
    /// Destinations excluded for weight <= 0.
    pub dropped_zero_weight: usize,
    /// Features with no network element within the search tolerance.
    pub dropped_unlocated: usize,
}

/// Resolve origin features. Origins carry no weight; every snappable feature
/// survives with `batch_id = 0` until the planner runs.
pub fn resolve_origins<L: NetworkLocator>(
    features: &[RawFeature],
    locator: &L,
) -> (Vec<OriginPoint>, ResolveSummary) {
    let mut summary = ResolveSummary {
        input: features.len(),
        ..Default::default()
    };

    let mut origins = Vec::with_capacity(features.len());
    for feature in features {
        let location = feature.geometry.representative_point();
        let Some(network_location) = locator.locate(location) else {
            warn!(id = %feature.id.as_text(), "origin not within network search tolerance, dropping");
            summary.dropped_unlocated += 1;
            continue;
        };
        origins.push(OriginPoint {
            id: feature.id.clone(),
            id_text: feature.id.as_text(),
            location,
            network_location,
            batch_id: 0,
        });
    }

    summary.resolved = origins.len();
    info!(
        input = summary.input,
        resolved = summary.resolved,
        unlocated = summary.dropped_unlocated,
        "finished pre-processing origins"
    );
    (origins, summary)
}

/// Resolve destination features.
///
/// Fails fast with a configuration error if any weight value is non-numeric
/// or missing: a bad weight field is a run-level mistake, not a per-feature
/// one, and must surface before any solving starts.
pub fn resolve_destinations<L: NetworkLocator>(
    features: &[RawFeature],
    locator: &L,
) -> Result<(Vec<DestinationPoint>, ResolveSummary), ConfigurationError> {
    // validation pass over the whole field before anything else
    let mut weights = Vec::with_capacity(features.len());
    for feature in features {
        weights.push(numeric_weight(feature)?);
    }

    let mut summary = ResolveSummary {
        input: features.len(),
        ..Default::default()
    };

    let mut destinations = Vec::with_capacity(features.len());
    for (feature, weight) in features.iter().zip(weights) {
        if weight <= 0.0 {
            summary.dropped_zero_weight += 1;
            continue;
        }
        let location = feature.geometry.representative_point();
        let Some(network_location) = locator.locate(location) else {
            warn!(id = %feature.id.as_text(), "destination not within network search tolerance, dropping");
            summary.dropped_unlocated += 1;
            continue;
        };
        destinations.push(DestinationPoint {
            id: feature.id.clone(),
            id_text: feature.id.as_text(),
            location,
            network_location,
            weight,
        });
    }

    summary.resolved = destinations.len();
    info!(
        input = summary.input,
        resolved = summary.resolved,
        zero_weight = summary.dropped_zero_weight,
        unlocated = summary.dropped_unlocated,
        "finished pre-processing destinations"
    );
    Ok((destinations, summary))
}

fn numeric_weight(feature: &RawFeature) -> Result<f64, ConfigurationError> {
    let value = feature
        .weight
        .as_ref()
        .ok_or_else(|| ConfigurationError::NonNumericWeight {
            feature: feature.id.as_text(),
            value: "<missing>".to_string(),
        })?;
    match value {
        FieldValue::Null => Ok(0.0),
        other => other
            .as_f64()
            .ok_or_else(|| ConfigurationError::NonNumericWeight {
                feature: feature.id.as_text(),
                value: other.as_text(),
            }),
    }
}

/// Snap-to-nearest-vertex locator over an explicit vertex list.
///
/// Stands in for a real network dataset: each candidate is an (edge id,
/// location) pair, and a point matches the nearest candidate within the
/// search tolerance.
#[derive(Debug, Clone)]
pub struct VertexSnapLocator {
    candidates: Vec<(u64, (f64, f64))>,
    tolerance_m: f64,
}

impl VertexSnapLocator {
    pub fn new(candidates: Vec<(u64, (f64, f64))>, tolerance_m: f64) -> Self {
        Self {
            candidates,
            tolerance_m,
        }
    }

    /// Locator that accepts every point as-is. Convenient when inputs are
    /// already network-bound (e.g. a precomputed cost table keyed by id).
    pub fn permissive() -> Self {
        Self {
            candidates: Vec::new(),
            tolerance_m: f64::INFINITY,
        }
    }
}

impl NetworkLocator for VertexSnapLocator {
    fn locate(&self, point: (f64, f64)) -> Option<NetworkLocation> {
        if self.candidates.is_empty() {
            return if self.tolerance_m.is_infinite() {
                Some(NetworkLocation {
                    edge_id: 0,
                    position: 0.0,
                    snap_distance_m: 0.0,
                })
            } else {
                None
            };
        }

        let (edge_id, distance_m) = self
            .candidates
            .iter()
            .map(|(edge_id, vertex)| (*edge_id, haversine_km(point, *vertex) * 1000.0))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;

        if distance_m <= self.tolerance_m {
            Some(NetworkLocation {
                edge_id,
                position: 0.0,
                snap_distance_m: distance_m,
            })
        } else {
            None
        }
    }
}
