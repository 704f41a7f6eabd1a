//! Core data model for accessibility runs.
//!
//! Raw features come in with arbitrary scalar identifiers and optional
//! opportunity weights; preprocessing turns them into snapped origin and
//! destination points. Solver output is a flat OD pair list; the worker
//! condenses it into per-origin accessibility records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A scalar feature attribute. External identifiers may be numeric or text
/// and must round-trip unchanged, so the original value is kept alongside a
/// stable text rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl FieldValue {
    /// Canonical text form used as the join key through the solver round trip.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Float(v) => v.to_string(),
            FieldValue::Text(v) => v.clone(),
            FieldValue::Null => String::new(),
        }
    }

    /// Numeric view, if this value has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Text(_) | FieldValue::Null => None,
        }
    }
}

/// Input geometry. Non-point geometry is reduced to a representative
/// interior point during preprocessing.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// (lat, lng)
    Point((f64, f64)),
    /// Exterior ring, (lat, lng) vertices.
    Polygon(Vec<(f64, f64)>),
}

impl Geometry {
    /// Representative point: the point itself, or the ring centroid.
    pub fn representative_point(&self) -> (f64, f64) {
        match self {
            Geometry::Point(p) => *p,
            Geometry::Polygon(ring) => ring_centroid(ring),
        }
    }
}

/// Area-weighted centroid of a simple ring (shoelace formula), falling back
/// to the vertex mean for degenerate rings.
fn ring_centroid(ring: &[(f64, f64)]) -> (f64, f64) {
    if ring.is_empty() {
        return (0.0, 0.0);
    }
    if ring.len() < 3 {
        let (sy, sx) = ring
            .iter()
            .fold((0.0, 0.0), |(sy, sx), (y, x)| (sy + y, sx + x));
        let n = ring.len() as f64;
        return (sy / n, sx / n);
    }

    let mut area = 0.0;
    let mut cy = 0.0;
    let mut cx = 0.0;
    for i in 0..ring.len() {
        let (y0, x0) = ring[i];
        let (y1, x1) = ring[(i + 1) % ring.len()];
        let cross = x0 * y1 - x1 * y0;
        area += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }

    if area.abs() < f64::EPSILON {
        let (sy, sx) = ring
            .iter()
            .fold((0.0, 0.0), |(sy, sx), (y, x)| (sy + y, sx + x));
        let n = ring.len() as f64;
        return (sy / n, sx / n);
    }

    (cy / (3.0 * area), cx / (3.0 * area))
}

/// An un-preprocessed input feature.
#[derive(Debug, Clone)]
pub struct RawFeature {
    pub id: FieldValue,
    pub geometry: Geometry,
    /// Opportunity weight attribute; only meaningful for destinations.
    pub weight: Option<FieldValue>,
}

impl RawFeature {
    pub fn new(id: FieldValue, geometry: Geometry) -> Self {
        Self {
            id,
            geometry,
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: FieldValue) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// Where a point landed on the network after snapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkLocation {
    pub edge_id: u64,
    /// Position along the edge in [0, 1].
    pub position: f64,
    /// Snap distance from the input point, meters.
    pub snap_distance_m: f64,
}

/// An origin, ready to solve. Immutable once the planner has tagged it with
/// a batch id.
#[derive(Debug, Clone)]
pub struct OriginPoint {
    pub id: FieldValue,
    pub id_text: String,
    /// (lat, lng)
    pub location: (f64, f64),
    pub network_location: NetworkLocation,
    /// 1-based batch assignment; 0 until the planner runs.
    pub batch_id: u32,
}

/// A destination with a positive opportunity weight. Shared read-only by
/// every batch.
#[derive(Debug, Clone)]
pub struct DestinationPoint {
    pub id: FieldValue,
    pub id_text: String,
    /// (lat, lng)
    pub location: (f64, f64),
    pub network_location: NetworkLocation,
    pub weight: f64,
}

/// One reachable origin-destination pair from a cost-matrix solve.
/// Pairs beyond the cutoff are simply absent.
#[derive(Debug, Clone, PartialEq)]
pub struct OdPair {
    pub origin: String,
    pub destination: String,
    /// Travel cost in minutes.
    pub total_time: f64,
}

/// Per-origin accessibility sums for one departure slice.
///
/// `scores` is parallel to the selected impedance function list; an origin
/// with zero reachable destinations carries all-zero scores, never nulls.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessibilityRecord {
    pub origin: String,
    pub scores: Vec<f64>,
    /// Count of OD pairs that contributed.
    pub frequency: u64,
    pub departure: Option<NaiveDateTime>,
}
