//! Prototype microelastic brittle (bond-based) material.
//!
//! Force on point `i` from bond `ij`:
//!
//! ```text
//! f_ij = c · ε_ij / L_ij · V_j · (x_j − x_i)
//! ```
//!
//! where `ε_ij = (L_ij − L⁰_ij) / L⁰_ij` and `c` is the bond constant.

use crate::properties::PointParameters;
use crate::traits::BondModel;

/// Bond-based (PMB) material model.
#[derive(Debug, Clone, Copy, Default)]
pub struct BondBased;

impl BondBased {
    /// Creates the model.
    pub fn new() -> Self {
        Self
    }
}

impl BondModel for BondBased {
    #[inline]
    fn bond_force(&self, params: &PointParameters, stretch: f64, length: f64) -> f64 {
        params.bond_constant * stretch / length
    }

    #[inline]
    fn stiffness_term(&self, params: &PointParameters, initial_length: f64, neighbor_volume: f64) -> f64 {
        neighbor_volume * params.bond_constant / initial_length
    }

    fn name(&self) -> &str {
        "bond_based"
    }
}
