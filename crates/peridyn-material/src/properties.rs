//! Material inputs and derived point parameters.
//!
//! Bond-based peridynamics fixes Poisson's ratio at 1/4 in 3-D, so every
//! elastic constant follows from Young's modulus alone.

use serde::{Deserialize, Serialize};
use peridyn_types::{PeridynError, PeridynResult};

/// Poisson's ratio implied by 3-D bond-based peridynamics.
pub const BOND_BASED_POISSON_RATIO: f64 = 0.25;

/// Fracture criterion of a material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fracture {
    /// Critical energy release rate `Gc`; critical stretch is derived.
    EnergyReleaseRate(f64),
    /// Critical bond stretch `ε_c` given directly.
    CriticalStretch(f64),
    /// Bonds never break.
    Unbreakable,
}

/// User-facing material definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    /// Human-readable name (e.g., "steel").
    pub name: String,
    /// Interaction radius `δ`.
    pub horizon: f64,
    /// Mass density `ρ`.
    pub density: f64,
    /// Young's modulus `E`.
    pub youngs_modulus: f64,
    /// Fracture criterion.
    pub fracture: Fracture,
}

impl MaterialSpec {
    /// Returns a copy with a different horizon.
    ///
    /// Presets carry a placeholder horizon; the horizon is a property of
    /// the discretization and is usually chosen per job.
    pub fn with_horizon(&self, horizon: f64) -> Self {
        Self {
            horizon,
            ..self.clone()
        }
    }
}

/// Fully resolved parameters of one point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointParameters {
    /// Horizon `δ`.
    pub horizon: f64,
    /// Density `ρ`.
    pub density: f64,
    /// Young's modulus `E`.
    pub youngs_modulus: f64,
    /// Poisson's ratio `ν` (always 1/4).
    pub poisson_ratio: f64,
    /// Bulk modulus `K`.
    pub bulk_modulus: f64,
    /// Shear modulus `G`.
    pub shear_modulus: f64,
    /// Critical energy release rate `Gc` (infinite when unbreakable).
    pub energy_release_rate: f64,
    /// Critical stretch `ε_c` (infinite when unbreakable).
    pub critical_stretch: f64,
    /// Bond constant (micromodulus) `c = 18K / (π δ⁴)`.
    pub bond_constant: f64,
}

impl PointParameters {
    /// Resolve a material spec into point parameters.
    ///
    /// Fails with [`PeridynError::InvalidMaterial`] on non-positive or
    /// non-finite inputs.
    pub fn new(spec: &MaterialSpec) -> PeridynResult<Self> {
        check_positive(&spec.name, "horizon", spec.horizon)?;
        check_positive(&spec.name, "density", spec.density)?;
        check_positive(&spec.name, "youngs_modulus", spec.youngs_modulus)?;

        let nu = BOND_BASED_POISSON_RATIO;
        let e = spec.youngs_modulus;
        let delta = spec.horizon;
        let bulk_modulus = e / (3.0 * (1.0 - 2.0 * nu));
        let shear_modulus = e / (2.0 * (1.0 + nu));
        let bond_constant = 18.0 * bulk_modulus / (std::f64::consts::PI * delta.powi(4));

        let (energy_release_rate, critical_stretch) = match spec.fracture {
            Fracture::EnergyReleaseRate(gc) => {
                check_positive(&spec.name, "energy_release_rate", gc)?;
                (gc, (5.0 * gc / (9.0 * bulk_modulus * delta)).sqrt())
            }
            Fracture::CriticalStretch(eps) => {
                check_positive(&spec.name, "critical_stretch", eps)?;
                (9.0 * bulk_modulus * delta * eps * eps / 5.0, eps)
            }
            Fracture::Unbreakable => (f64::INFINITY, f64::INFINITY),
        };

        Ok(Self {
            horizon: delta,
            density: spec.density,
            youngs_modulus: e,
            poisson_ratio: nu,
            bulk_modulus,
            shear_modulus,
            energy_release_rate,
            critical_stretch,
            bond_constant,
        })
    }

    /// Returns true if bonds of this material can break.
    pub fn allows_failure(&self) -> bool {
        self.critical_stretch.is_finite()
    }
}

fn check_positive(material: &str, field: &str, value: f64) -> PeridynResult<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(PeridynError::InvalidMaterial(format!(
            "{material}: {field} must be positive and finite, got {value}"
        )));
    }
    Ok(())
}
