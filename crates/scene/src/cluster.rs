//! Spreading co-located points so each one gets its own marker.
//!
//! Records with identical raw coordinates form a cluster. The i-th member of a
//! cluster of size `n > 1` is placed on a widening spiral around the raw
//! coordinate:
//!
//! ```text
//! angle  = 2π·i / max(n, 8)
//! radius = base_radius · (1 + 0.1·i)
//! ```
//!
//! Singletons stay exactly where they are. The layout depends only on input
//! order, so re-resolving the same collection yields the same positions.

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::TAU;

use foundation::math::LatLng;

use crate::points::{ClusterKey, DisplayPoint, PointId, PointRecord};

/// Offset scale in degrees (roughly 11 m of latitude).
pub const DEFAULT_BASE_RADIUS_DEG: f64 = 0.0001;

/// Small clusters still spread over at least this many angular slots.
const MIN_ANGULAR_SLOTS: usize = 8;

/// Per-member radial growth; keeps members distinct once angles wrap.
const RADIUS_GROWTH: f64 = 0.1;

/// Display coordinate of member `index` in a cluster of `cluster_size` at `raw`.
pub fn offset_position(
    raw: LatLng,
    index: usize,
    cluster_size: usize,
    base_radius: f64,
) -> LatLng {
    if cluster_size <= 1 {
        return raw;
    }
    let i = index as f64;
    let angle = TAU * i / cluster_size.max(MIN_ANGULAR_SLOTS) as f64;
    let radius = base_radius * (1.0 + i * RADIUS_GROWTH);
    LatLng::new(raw.lat + radius * angle.cos(), raw.lng + radius * angle.sin())
}

/// Resolves a full record collection into display points.
///
/// Unlocated records (non-finite coordinates) are dropped and do not count
/// towards any cluster. Ids are unique in the output: a repeated id keeps its
/// first located record. Output order follows input order.
pub fn resolve_display_points(records: &[PointRecord], base_radius: f64) -> Vec<DisplayPoint> {
    let mut seen: BTreeSet<&PointId> = BTreeSet::new();
    let kept: Vec<&PointRecord> = records
        .iter()
        .filter(|&r| r.is_located() && seen.insert(&r.id))
        .collect();

    let mut sizes: BTreeMap<ClusterKey, usize> = BTreeMap::new();
    for rec in &kept {
        *sizes.entry(ClusterKey::of(rec.raw_position())).or_insert(0) += 1;
    }

    let mut next_index: BTreeMap<ClusterKey, usize> = BTreeMap::new();
    let mut out = Vec::with_capacity(kept.len());
    for rec in kept {
        let raw = rec.raw_position();
        let key = ClusterKey::of(raw);
        let cluster_size = sizes.get(&key).copied().unwrap_or(1);
        let slot = next_index.entry(key).or_insert(0);
        let cluster_index = *slot;
        *slot += 1;

        out.push(DisplayPoint {
            record: rec.clone(),
            position: offset_position(raw, cluster_index, cluster_size, base_radius),
            cluster_key: key,
            cluster_index,
            cluster_size,
        });
    }
    out
}
