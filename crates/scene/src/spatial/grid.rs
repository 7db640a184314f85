use std::collections::HashMap;

use foundation::math::LatLng;

use crate::points::{DisplayPoint, PointId};

/// Default cell edge in degrees.
pub const DEFAULT_GRID_SIZE_DEG: f64 = 2.0;

/// Coarse lat/lng bucket: `(floor(lat / size), floor(lng / size))`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    pub lat: i64,
    pub lng: i64,
}

impl CellKey {
    pub fn of(p: LatLng, grid_size: f64) -> Self {
        Self {
            lat: (p.lat / grid_size).floor() as i64,
            lng: (p.lng / grid_size).floor() as i64,
        }
    }
}

/// Uniform grid over display coordinates for hover prefiltering.
///
/// The index is immutable: a new point set means a new index. Lookups only
/// consult the probe's own cell, so a neighbour sitting just across a cell
/// edge is not a candidate. Hover tolerates that miss.
///
/// Ordering contract:
/// - ids within a cell are returned in the order the points were indexed.
#[derive(Debug, Clone)]
pub struct GridIndex {
    grid_size: f64,
    cells: HashMap<CellKey, Vec<PointId>>,
    len: usize,
}

impl GridIndex {
    pub fn empty(grid_size: f64) -> Self {
        Self {
            grid_size,
            cells: HashMap::new(),
            len: 0,
        }
    }

    pub fn build(points: &[DisplayPoint], grid_size: f64) -> Self {
        let mut index = Self::empty(grid_size);
        for p in points {
            index
                .cells
                .entry(CellKey::of(p.position, grid_size))
                .or_default()
                .push(p.id().clone());
            index.len += 1;
        }
        index
    }

    pub fn grid_size(&self) -> f64 {
        self.grid_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_of(&self, p: LatLng) -> CellKey {
        CellKey::of(p, self.grid_size)
    }

    /// Ids in the probe's cell; empty when the cell is unoccupied.
    pub fn candidates(&self, probe: LatLng) -> &[PointId] {
        self.cell(self.cell_of(probe))
    }

    pub fn cell(&self, key: CellKey) -> &[PointId] {
        self.cells.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }
}
