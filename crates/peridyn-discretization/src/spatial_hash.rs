//! Spatial hash for horizon neighbor search.
//!
//! Partitions space into a uniform grid and bins points into cells.
//! A query visits every cell overlapped by the box `[p − r, p + r]`, so
//! points at distance exactly `r` are never lost to floor rounding.

use std::collections::HashMap;

use glam::DVec3;

/// Uniform-grid spatial hash over a fixed set of points.
pub struct SpatialHash {
    /// Inverse cell size (cached for performance).
    inv_cell_size: f64,
    /// Hash map from cell key to the indices of the points it contains.
    grid: HashMap<(i64, i64, i64), Vec<usize>>,
}

impl SpatialHash {
    /// Bin `positions` into cells of edge `cell_size`.
    pub fn build(positions: &[DVec3], cell_size: f64) -> Self {
        let cell_size = cell_size.max(1e-12);
        let mut hash = Self {
            inv_cell_size: 1.0 / cell_size,
            grid: HashMap::new(),
        };

        for (i, &p) in positions.iter().enumerate() {
            let key = hash.cell_key(p);
            hash.grid.entry(key).or_default().push(i);
        }

        hash
    }

    /// Hash a position to a cell key.
    fn cell_key(&self, p: DVec3) -> (i64, i64, i64) {
        let cx = (p.x * self.inv_cell_size).floor() as i64;
        let cy = (p.y * self.inv_cell_size).floor() as i64;
        let cz = (p.z * self.inv_cell_size).floor() as i64;
        (cx, cy, cz)
    }

    /// Indices of all points in the cells overlapped by the box of
    /// half-width `radius` around `p`, ascending.
    ///
    /// The result is a superset of the points within `radius`; callers
    /// filter by distance. Sorting makes the visiting order the global
    /// enumeration order regardless of hash iteration order.
    pub fn candidates(&self, p: DVec3, radius: f64) -> Vec<usize> {
        // Padded so `p ± r` rounding cannot drop a cell.
        let reach = DVec3::splat(radius.max(0.0) * (1.0 + 1e-9));
        let (lx, ly, lz) = self.cell_key(p - reach);
        let (hx, hy, hz) = self.cell_key(p + reach);
        let mut out = Vec::new();

        for cx in lx..=hx {
            for cy in ly..=hy {
                for cz in lz..=hz {
                    if let Some(points) = self.grid.get(&(cx, cy, cz)) {
                        out.extend_from_slice(points);
                    }
                }
            }
        }

        out.sort_unstable();
        out
    }

    /// Number of occupied cells.
    pub fn cell_count(&self) -> usize {
        self.grid.len()
    }
}
