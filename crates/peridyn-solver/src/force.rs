//! Internal force density.
//!
//! A [`ForceDensity`] writes `b_int` of the owned points of a chunk and
//! may break bonds. It also declares which fields must be exchanged
//! around its computation: `loc_to_halo_fields` before (neighbor state it
//! reads), `halo_to_loc_fields` after (contributions it writes into halo
//! rows on behalf of other chunks).

use glam::DVec3;
use peridyn_material::{BondBased, BondModel};
use peridyn_types::PeridynResult;

use crate::chunk::BodyChunk;
use crate::storage::PointField;

/// Internal force density of a chunk.
pub trait ForceDensity: Send + Sync {
    /// Fields refreshed in halo rows before [`compute_force_density`](Self::compute_force_density).
    fn loc_to_halo_fields(&self) -> &[PointField];

    /// Fields accumulated from halo rows into owners afterwards.
    fn halo_to_loc_fields(&self) -> &[PointField];

    /// Recomputes `b_int` and returns the number of bonds broken.
    fn compute_force_density(&self, chunk: &mut BodyChunk) -> PeridynResult<u64>;

    /// Smallest stable explicit time step among the owned points.
    ///
    /// `f64::INFINITY` if no owned point has a bond.
    fn critical_time_step(&self, chunk: &BodyChunk) -> f64;

    /// Returns the name of this force model.
    fn name(&self) -> &str;
}

/// Pairwise force density driven by a [`BondModel`].
///
/// Every owned point sums its own bonds, so halo rows of `b_int` are never
/// written and no halo → loc exchange is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BondForce<M = BondBased> {
    model: M,
}

impl BondForce<BondBased> {
    /// The prototype microelastic brittle force.
    pub const fn bond_based() -> Self {
        Self { model: BondBased }
    }
}

impl<M: BondModel> BondForce<M> {
    /// Wraps a bond model.
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// The underlying bond model.
    pub fn model(&self) -> &M {
        &self.model
    }
}

const READS_POSITION: &[PointField] = &[PointField::Position];

impl<M: BondModel> ForceDensity for BondForce<M> {
    fn loc_to_halo_fields(&self) -> &[PointField] {
        READS_POSITION
    }

    fn halo_to_loc_fields(&self) -> &[PointField] {
        &[]
    }

    fn compute_force_density(&self, chunk: &mut BodyChunk) -> PeridynResult<u64> {
        let n_loc = chunk.n_loc();
        let BodyChunk {
            system,
            storage,
            parameters,
            ..
        } = chunk;

        storage.b_int.fill(DVec3::ZERO);
        let mut broken = 0u64;

        for i in 0..n_loc {
            let params = parameters.get(i);
            let xi = storage.position[i];
            let range = system.bond_ids[i].clone();
            let mut bi = DVec3::ZERO;

            for b in range {
                if !storage.bond_active[b] {
                    continue;
                }
                let bond = &system.bonds[b];
                let j = bond.neighbor;
                let delta = storage.position[j] - xi;
                let length = delta.length();
                let stretch = (length - bond.length) / bond.length;

                if bond.fail_permit && self.model.exceeds_critical_stretch(params, stretch) {
                    storage.bond_active[b] = false;
                    storage.n_active_bonds[i] -= 1;
                    broken += 1;
                    continue;
                }

                bi += self.model.bond_force(params, stretch, length) * system.volume[j] * delta;
            }
            storage.b_int[i] = bi;
        }

        Ok(broken)
    }

    fn critical_time_step(&self, chunk: &BodyChunk) -> f64 {
        let mut dt = f64::INFINITY;
        for i in 0..chunk.n_loc() {
            let params = chunk.params(i);
            let stiffness: f64 = chunk
                .system
                .bonds_of(i)
                .iter()
                .map(|b| self.model.stiffness_term(params, b.length, chunk.system.volume[b.neighbor]))
                .sum();
            if stiffness > 0.0 {
                dt = dt.min((2.0 * params.density / stiffness).sqrt());
            }
        }
        dt
    }

    fn name(&self) -> &str {
        self.model.name()
    }
}
