//! Batch planning: worker sizing, batch sizing, and origin ordering.
//!
//! Origins are sorted along a Hilbert space-filling curve before batch ids
//! are assigned, so each batch covers a compact neighborhood. Contiguous
//! runs of the sorted order then become batches 1..=batch_count.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tracing::info;

use crate::model::OriginPoint;
use crate::traits::OriginOrdering;

/// Side length of the Hilbert grid (order-16 curve).
const HILBERT_SIDE: u64 = 1 << 16;

/// Available workers: logical cores minus one, minimum one. The spare core
/// keeps the dispatching thread and the rest of the machine responsive.
pub fn default_worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if cores <= 1 { 1 } else { cores - 1 }
}

/// Batch size policy.
///
/// When `ceil(n / workers)` fits under the configured factor, one batch per
/// worker (plus one item of slack so the trailing batch is not a sliver)
/// maximizes parallel utilization. Otherwise the factor caps batch size to
/// protect the solver from oversized single problems.
pub fn plan_batch_size(origin_count: usize, workers: usize, batch_size_factor: usize) -> usize {
    let workers = workers.max(1);
    let per_worker = origin_count.div_ceil(workers);
    if per_worker <= batch_size_factor {
        per_worker + 1
    } else {
        batch_size_factor
    }
}

/// Sort origins by the given ordering strategy and tag each with a 1-based
/// batch id, incrementing every `batch_size` items. Returns the batch count.
pub fn assign_batches(
    origins: &mut Vec<OriginPoint>,
    ordering: &dyn OriginOrdering,
    batch_size: usize,
) -> u32 {
    if origins.is_empty() {
        return 0;
    }
    let batch_size = batch_size.max(1);

    let keys = ordering.rank(origins);
    debug_assert_eq!(keys.len(), origins.len());

    let mut order: Vec<usize> = (0..origins.len()).collect();
    order.sort_by_key(|&i| keys[i]);

    let mut sorted = Vec::with_capacity(origins.len());
    for (position, &i) in order.iter().enumerate() {
        let mut origin = origins[i].clone();
        origin.batch_id = (position / batch_size) as u32 + 1;
        sorted.push(origin);
    }

    let batch_count = origins.len().div_ceil(batch_size) as u32;
    info!(
        origins = origins.len(),
        batch_size, batch_count, "assigned origin batches"
    );
    *origins = sorted;
    batch_count
}

/// Hilbert-curve ordering over the origin bounding box (the default).
#[derive(Debug, Clone, Default)]
pub struct HilbertOrdering;

impl OriginOrdering for HilbertOrdering {
    fn rank(&self, origins: &[OriginPoint]) -> Vec<u64> {
        let Some(bbox) = bounding_box(origins) else {
            return Vec::new();
        };
        origins
            .iter()
            .map(|origin| {
                let (gx, gy) = to_grid(origin.location, bbox);
                hilbert_index(gx, gy)
            })
            .collect()
    }
}

/// Hash-of-identifier ordering: spatially blind, but deterministic and
/// independent of geometry. Useful when origins have no meaningful spread
/// (e.g. all snapped to one stop) or to randomize load instead.
#[derive(Debug, Clone, Default)]
pub struct IdHashOrdering;

impl OriginOrdering for IdHashOrdering {
    fn rank(&self, origins: &[OriginPoint]) -> Vec<u64> {
        origins
            .iter()
            .map(|origin| {
                let mut hasher = DefaultHasher::new();
                origin.id_text.hash(&mut hasher);
                hasher.finish()
            })
            .collect()
    }
}

type BBox = ((f64, f64), (f64, f64));

fn bounding_box(origins: &[OriginPoint]) -> Option<BBox> {
    let first = origins.first()?;
    let mut min = first.location;
    let mut max = first.location;
    for origin in origins {
        let (lat, lng) = origin.location;
        min.0 = min.0.min(lat);
        min.1 = min.1.min(lng);
        max.0 = max.0.max(lat);
        max.1 = max.1.max(lng);
    }
    Some((min, max))
}

/// Scale a location into the Hilbert grid. Degenerate extents collapse to
/// column/row zero, which keeps the ordering total.
fn to_grid(location: (f64, f64), bbox: BBox) -> (u64, u64) {
    let ((min_lat, min_lng), (max_lat, max_lng)) = bbox;
    let scale = |value: f64, lo: f64, hi: f64| -> u64 {
        if hi - lo <= f64::EPSILON {
            return 0;
        }
        let unit = (value - lo) / (hi - lo);
        ((unit * (HILBERT_SIDE - 1) as f64).round() as u64).min(HILBERT_SIDE - 1)
    };
    (
        scale(location.1, min_lng, max_lng),
        scale(location.0, min_lat, max_lat),
    )
}

/// Distance along the order-16 Hilbert curve for a grid cell.
fn hilbert_index(mut x: u64, mut y: u64) -> u64 {
    let mut d: u64 = 0;
    let mut s = HILBERT_SIDE / 2;
    while s > 0 {
        let rx = u64::from(x & s > 0);
        let ry = u64::from(y & s > 0);
        d += s * s * ((3 * rx) ^ ry);
        // rotate the quadrant so the curve stays contiguous
        if ry == 0 {
            if rx == 1 {
                x = HILBERT_SIDE - 1 - x;
                y = HILBERT_SIDE - 1 - y;
            }
            std::mem::swap(&mut x, &mut y);
        }
        s /= 2;
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldValue, NetworkLocation, OriginPoint};

    fn origin(id: &str, lat: f64, lng: f64) -> OriginPoint {
        OriginPoint {
            id: FieldValue::Text(id.to_string()),
            id_text: id.to_string(),
            location: (lat, lng),
            network_location: NetworkLocation {
                edge_id: 0,
                position: 0.0,
                snap_distance_m: 0.0,
            },
            batch_id: 0,
        }
    }

    fn grid_origins(side: usize) -> Vec<OriginPoint> {
        let mut origins = Vec::new();
        for row in 0..side {
            for col in 0..side {
                origins.push(origin(
                    &format!("o{row}_{col}"),
                    40.0 + row as f64 * 0.01,
                    -100.0 + col as f64 * 0.01,
                ));
            }
        }
        origins
    }

    #[test]
    fn batch_size_optimized_branch() {
        // ceil(100/4) = 25 <= 500 -> 26
        assert_eq!(plan_batch_size(100, 4, 500), 26);
    }

    #[test]
    fn batch_size_capped_branch() {
        // ceil(10_000/4) = 2500 > 500 -> cap
        assert_eq!(plan_batch_size(10_000, 4, 500), 500);
    }

    #[test]
    fn batch_size_single_worker() {
        assert_eq!(plan_batch_size(10, 1, 500), 11);
    }

    #[test]
    fn batches_partition_origins_exactly() {
        let mut origins = grid_origins(7); // 49 origins
        let batch_count = assign_batches(&mut origins, &HilbertOrdering, 10);

        assert_eq!(batch_count, 5);
        assert_eq!(origins.len(), 49);
        for batch_id in 1..=batch_count {
            let size = origins.iter().filter(|o| o.batch_id == batch_id).count();
            assert!(size <= 10, "batch {batch_id} oversized: {size}");
            assert!(size > 0, "batch {batch_id} empty");
        }
        // no gaps, no strays
        assert!(origins.iter().all(|o| (1..=batch_count).contains(&o.batch_id)));
        let full: usize = (1..batch_count)
            .map(|b| origins.iter().filter(|o| o.batch_id == b).count())
            .sum();
        assert_eq!(full, 40, "all but the last batch must be full");
    }

    #[test]
    fn batch_ids_are_contiguous_runs() {
        let mut origins = grid_origins(4);
        assign_batches(&mut origins, &HilbertOrdering, 5);
        for window in origins.windows(2) {
            let diff = window[1].batch_id as i64 - window[0].batch_id as i64;
            assert!((0..=1).contains(&diff), "batch ids must be non-decreasing runs");
        }
    }

    #[test]
    fn hilbert_keeps_neighbors_together() {
        // With a 4x4 grid in 4 batches of 4, every batch should span a small
        // bounding box rather than a full row slice of the region.
        let mut origins = grid_origins(4);
        assign_batches(&mut origins, &HilbertOrdering, 4);

        for batch_id in 1..=4u32 {
            let members: Vec<_> = origins.iter().filter(|o| o.batch_id == batch_id).collect();
            let lat_span = members
                .iter()
                .map(|o| o.location.0)
                .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
            let lng_span = members
                .iter()
                .map(|o| o.location.1)
                .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
            // each quadrant of the 4x4 grid spans one 0.01-degree step
            assert!(lat_span.1 - lat_span.0 <= 0.011, "batch {batch_id} spread in lat");
            assert!(lng_span.1 - lng_span.0 <= 0.011, "batch {batch_id} spread in lng");
        }
    }

    #[test]
    fn id_hash_ordering_is_deterministic() {
        let mut a = grid_origins(3);
        let mut b = grid_origins(3);
        assign_batches(&mut a, &IdHashOrdering, 4);
        assign_batches(&mut b, &IdHashOrdering, 4);
        let ids_a: Vec<_> = a.iter().map(|o| (o.id_text.clone(), o.batch_id)).collect();
        let ids_b: Vec<_> = b.iter().map(|o| (o.id_text.clone(), o.batch_id)).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn empty_origin_set_yields_zero_batches() {
        let mut origins = Vec::new();
        assert_eq!(assign_batches(&mut origins, &HilbertOrdering, 10), 0);
    }

    #[test]
    fn identical_locations_still_partition() {
        let mut origins: Vec<_> = (0..9).map(|i| origin(&format!("o{i}"), 1.0, 2.0)).collect();
        let batch_count = assign_batches(&mut origins, &HilbertOrdering, 4);
        assert_eq!(batch_count, 3);
        assert!(origins.iter().all(|o| o.batch_id >= 1 && o.batch_id <= 3));
    }
}
