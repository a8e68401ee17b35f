//! Bond discretization.
//!
//! For every point `i`, the bonds to all points `j ≠ i` within the horizon
//! of `i`, stored as one flat table with a contiguous range per point.
//! Neighbor order is the global enumeration order, so the table is
//! reproducible across runs and across decompositions.

use std::ops::Range;

use glam::DVec3;
use peridyn_types::{PeridynError, PeridynResult, PointId};

use crate::body::Body;
use crate::chunk_handler::ChunkHandler;
use crate::spatial_hash::SpatialHash;

/// A directed bond from its source point to `neighbor`.
///
/// The mutable active flag of a bond lives in chunk storage; the bond
/// itself is immutable after discretization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
    /// Index of the neighbor in the owning system's index space.
    pub neighbor: usize,
    /// Undeformed bond length.
    pub length: f64,
    /// Whether the bond may break.
    pub fail_permit: bool,
}

/// Bond discretization of a body or of one chunk.
///
/// `position` and `volume` cover every point the system references
/// (owned points first, then halo points). `n_neighbors` and `bond_ids`
/// cover owned points only.
#[derive(Debug, Clone, PartialEq)]
pub struct BondSystem {
    /// Reference positions.
    pub position: Vec<DVec3>,
    /// Point volumes.
    pub volume: Vec<f64>,
    /// Flat bond table.
    pub bonds: Vec<Bond>,
    /// Number of bonds of each owned point.
    pub n_neighbors: Vec<usize>,
    /// Range of `bonds` belonging to each owned point.
    pub bond_ids: Vec<Range<usize>>,
}

impl BondSystem {
    /// Number of points that own bonds.
    #[inline]
    pub fn n_loc(&self) -> usize {
        self.n_neighbors.len()
    }

    /// Number of points referenced (owned + halo).
    #[inline]
    pub fn n_points(&self) -> usize {
        self.position.len()
    }

    /// Total number of bonds.
    #[inline]
    pub fn n_bonds(&self) -> usize {
        self.bonds.len()
    }

    /// Bonds of owned point `i`.
    #[inline]
    pub fn bonds_of(&self, i: usize) -> &[Bond] {
        &self.bonds[self.bond_ids[i].clone()]
    }

    /// Re-express the bonds of one chunk in its local index space.
    ///
    /// `global` must be the discretization of the whole body. Positions
    /// and volumes are gathered for every id in `handler.point_ids`;
    /// bonds are copied for owned points with neighbors resolved through
    /// the localizer.
    pub fn localize(global: &BondSystem, handler: &ChunkHandler) -> PeridynResult<Self> {
        let position = handler
            .point_ids
            .iter()
            .map(|id| global.position[id.index()])
            .collect();
        let volume = handler
            .point_ids
            .iter()
            .map(|id| global.volume[id.index()])
            .collect();

        let n_loc = handler.n_loc();
        let mut bonds = Vec::new();
        let mut n_neighbors = Vec::with_capacity(n_loc);
        let mut bond_ids = Vec::with_capacity(n_loc);

        for id in handler.loc_point_ids() {
            let start = bonds.len();
            for bond in global.bonds_of(id.index()) {
                let gid = PointId::from(bond.neighbor);
                let neighbor = handler.localize(gid).ok_or_else(|| {
                    PeridynError::Decomposition(format!(
                        "Chunk {}: neighbor {} of point {} is neither owned nor halo",
                        handler.chunk_id.0, gid.0, id.0
                    ))
                })?;
                bonds.push(Bond { neighbor, ..*bond });
            }
            n_neighbors.push(bonds.len() - start);
            bond_ids.push(start..bonds.len());
        }

        Ok(Self {
            position,
            volume,
            bonds,
            n_neighbors,
            bond_ids,
        })
    }
}

/// Build the bond discretization of a whole body.
///
/// Point `i` bonds to every `j ≠ i` with `‖x_i − x_j‖ ≤ δ_i`, skipping
/// pairs separated by a precrack. Fails if the body has unassigned
/// materials or two points coincide.
pub fn find_bonds(body: &Body) -> PeridynResult<BondSystem> {
    body.validate()?;

    let n = body.n_points();
    let position = body.position();
    let hash = SpatialHash::build(position, body.max_horizon());
    let cut = precrack_filter(body)?;

    let mut bonds = Vec::new();
    let mut n_neighbors = Vec::with_capacity(n);
    let mut bond_ids = Vec::with_capacity(n);

    for i in 0..n {
        let start = bonds.len();
        let horizon = body.params(i).map(|p| p.horizon).unwrap_or(0.0);
        let xi = position[i];

        for j in hash.candidates(xi, horizon) {
            if j == i {
                continue;
            }
            let length = (position[j] - xi).length();
            if length > horizon {
                continue;
            }
            if length <= peridyn_types::constants::EPSILON {
                return Err(PeridynError::InvalidBody(format!(
                    "Body '{}': points {i} and {j} coincide",
                    body.name
                )));
            }
            if cut.iter().any(|c| c.separates(i, j)) {
                continue;
            }
            bonds.push(Bond {
                neighbor: j,
                length,
                fail_permit: body.fail_permit(i) && body.fail_permit(j),
            });
        }

        n_neighbors.push(bonds.len() - start);
        bond_ids.push(start..bonds.len());
    }

    tracing::debug!(
        body = %body.name,
        points = n,
        bonds = bonds.len(),
        cells = hash.cell_count(),
        "bond discretization built"
    );

    Ok(BondSystem {
        position: position.to_vec(),
        volume: body.volume().to_vec(),
        bonds,
        n_neighbors,
        bond_ids,
    })
}

/// Membership masks of one precrack.
struct PrecrackMask {
    a: Vec<bool>,
    b: Vec<bool>,
}

impl PrecrackMask {
    #[inline]
    fn separates(&self, i: usize, j: usize) -> bool {
        (self.a[i] && self.b[j]) || (self.b[i] && self.a[j])
    }
}

fn precrack_filter(body: &Body) -> PeridynResult<Vec<PrecrackMask>> {
    let n = body.n_points();
    body.precracks()
        .iter()
        .map(|(set_a, set_b)| {
            let mut mask = PrecrackMask {
                a: vec![false; n],
                b: vec![false; n],
            };
            for (name, flags) in [(set_a, &mut mask.a), (set_b, &mut mask.b)] {
                let members = body.point_set(name).ok_or_else(|| {
                    PeridynError::InvalidBody(format!(
                        "Body '{}': precrack references unknown point set '{name}'",
                        body.name
                    ))
                })?;
                for &i in members {
                    flags[i] = true;
                }
            }
            Ok(mask)
        })
        .collect()
}
