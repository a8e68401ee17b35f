//! Bond model trait — the per-bond material abstraction.
//!
//! The force-density stage of the solver walks every bond of a chunk and
//! asks the bond model for the scalar force law and failure criterion.

use crate::properties::PointParameters;

/// Trait for pairwise (bond) constitutive laws.
///
/// # Strategy Pattern
///
/// The solver is generic over the bond model, so a different pairwise law
/// can be swapped in without touching the bond loop.
pub trait BondModel: Send + Sync {
    /// Scalar force per unit volume² and unit length for a bond of current
    /// length `length` at stretch `stretch`.
    ///
    /// The force density contribution of neighbor `j` on point `i` is
    /// `bond_force(..) * V_j * (x_j - x_i)`.
    fn bond_force(&self, params: &PointParameters, stretch: f64, length: f64) -> f64;

    /// Returns true if a bond at `stretch` exceeds the failure criterion.
    fn exceeds_critical_stretch(&self, params: &PointParameters, stretch: f64) -> bool {
        stretch > params.critical_stretch
    }

    /// Contribution of one bond to the stable time step denominator
    /// `Σ_j V_j c / L_ij`.
    fn stiffness_term(&self, params: &PointParameters, initial_length: f64, neighbor_volume: f64) -> f64;

    /// Returns the name of this model.
    fn name(&self) -> &str;
}
