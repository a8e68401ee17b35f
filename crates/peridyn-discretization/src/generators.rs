//! Procedural point cloud generators.
//!
//! Points are placed at the centres of a regular grid of cubic cells of
//! edge `spacing`; every point carries the cell volume `spacing³`.
//! The x index varies fastest.

use glam::DVec3;
use peridyn_types::{PeridynError, PeridynResult};

/// Positions and volumes of a generated point cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    /// Point positions.
    pub position: Vec<DVec3>,
    /// Point volumes.
    pub volume: Vec<f64>,
}

impl PointCloud {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.position.len()
    }

    /// Returns true if the cloud has no points.
    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }
}

/// Generate a box of size `lx × ly × lz` centred at `center`.
pub fn uniform_box(lx: f64, ly: f64, lz: f64, spacing: f64, center: DVec3) -> PeridynResult<PointCloud> {
    check_spacing(spacing)?;
    let nx = cells_along(lx, spacing)?;
    let ny = cells_along(ly, spacing)?;
    let nz = cells_along(lz, spacing)?;

    let origin = center - DVec3::new(lx, ly, lz) * 0.5 + DVec3::splat(spacing * 0.5);
    let n = nx * ny * nz;
    let mut position = Vec::with_capacity(n);

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                position.push(origin + DVec3::new(i as f64, j as f64, k as f64) * spacing);
            }
        }
    }

    let volume = vec![spacing.powi(3); position.len()];
    Ok(PointCloud { position, volume })
}

/// Generate a cylinder of `radius` and `height` along z, centred at `center`.
///
/// Built from the enclosing box grid, keeping cells whose centre lies
/// inside the radius.
pub fn uniform_cylinder(radius: f64, height: f64, spacing: f64, center: DVec3) -> PeridynResult<PointCloud> {
    let bounding = uniform_box(2.0 * radius, 2.0 * radius, height, spacing, center)?;
    let r2 = radius * radius;

    let position: Vec<DVec3> = bounding
        .position
        .into_iter()
        .filter(|p| {
            let dx = p.x - center.x;
            let dy = p.y - center.y;
            dx * dx + dy * dy <= r2
        })
        .collect();

    let volume = vec![spacing.powi(3); position.len()];
    Ok(PointCloud { position, volume })
}

fn check_spacing(spacing: f64) -> PeridynResult<()> {
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(PeridynError::InvalidConfig(format!(
            "Point spacing must be positive, got {spacing}"
        )));
    }
    Ok(())
}

fn cells_along(length: f64, spacing: f64) -> PeridynResult<usize> {
    if !(length.is_finite() && length > 0.0) {
        return Err(PeridynError::InvalidConfig(format!(
            "Box edge length must be positive, got {length}"
        )));
    }
    let cells = (length / spacing).round() as usize;
    Ok(cells.max(1))
}
