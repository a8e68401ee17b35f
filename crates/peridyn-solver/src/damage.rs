//! Point damage.
//!
//! Damage of a point is the fraction of its bonds that have broken,
//! `1 − n_active / n_neighbors`. Bonds never heal, so damage never
//! decreases. Points without bonds have zero damage.

use crate::chunk::BodyChunk;

/// Damage summary of one chunk after a step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DamageReport {
    /// Largest point damage among owned points.
    pub max_damage: f64,
    /// Bonds broken during the step.
    pub broken_bonds: u64,
}

/// Recomputes the damage of every owned point from its active bond count.
pub fn update_damage(chunk: &mut BodyChunk) -> f64 {
    let n_loc = chunk.n_loc();
    let neighbors = &chunk.system.n_neighbors;
    let s = &mut chunk.storage;
    let mut max_damage: f64 = 0.0;

    for i in 0..n_loc {
        let d = point_damage(s.n_active_bonds[i], neighbors[i]);
        s.damage[i] = d;
        max_damage = max_damage.max(d);
    }
    max_damage
}

/// Damage of a point with `n_active` of `n_neighbors` bonds intact.
#[inline]
pub fn point_damage(n_active: usize, n_neighbors: usize) -> f64 {
    if n_neighbors == 0 {
        0.0
    } else {
        1.0 - n_active as f64 / n_neighbors as f64
    }
}
