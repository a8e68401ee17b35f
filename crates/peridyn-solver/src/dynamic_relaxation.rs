//! Adaptive dynamic relaxation.
//!
//! Finds a quasi-static equilibrium by integrating a fictitious, damped
//! dynamical system. Each point gets a per-axis fictitious mass
//!
//! ```text
//! m = Λ · 6K · Δt² / (δ²/3)
//! ```
//!
//! and every step the damping coefficient `cn` is re-estimated from the
//! change of the internal force density.
//!
//! # Damping is chunk-local
//!
//! `cn` is computed per chunk from chunk-local sums and is never reduced
//! across chunks. Results therefore depend on the chunk count; they are
//! still bit-identical between execution modes for the same chunk count.

use glam::DVec3;
use peridyn_telemetry::EventKind;
use peridyn_types::constants::{DEFAULT_DR_DAMPING_FACTOR, DEFAULT_DR_STEPSIZE, DR_CN_RESET};
use peridyn_types::{PeridynError, PeridynResult};

use crate::chunk::BodyChunk;
use crate::damage::update_damage;
use crate::data_handler::DataHandler;
use crate::force::ForceDensity;
use crate::kinematics::{check_force_density, update_displacement};
use crate::run::RunOptions;
use crate::storage::{ChunkStorage, GlobalField, PointField};
use crate::strategy::{Schedule, StepReport, StepScheme};
use crate::worker::Worker;

/// Adaptive dynamic relaxation time solver.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicRelaxation {
    /// Number of relaxation steps.
    pub steps: u32,
    /// Fictitious time step.
    pub stepsize: f64,
    /// Fictitious mass scaling `Λ`.
    pub damping_factor: f64,
}

impl DynamicRelaxation {
    /// Point fields the solver needs.
    pub const REQUIRED_POINT_FIELDS: &'static [PointField] = &[
        PointField::Position,
        PointField::Displacement,
        PointField::Velocity,
        PointField::VelocityHalf,
        PointField::VelocityHalfOld,
        PointField::BInt,
        PointField::BIntOld,
        PointField::BExt,
        PointField::DensityMatrix,
        PointField::Damage,
        PointField::NActiveBonds,
    ];

    /// Global fields the solver needs.
    pub const REQUIRED_GLOBAL_FIELDS: &'static [GlobalField] = &[GlobalField::DampingCoefficient];

    /// Validating constructor.
    pub fn new(steps: u32, stepsize: f64, damping_factor: f64) -> PeridynResult<Self> {
        let solver = Self {
            steps,
            stepsize,
            damping_factor,
        };
        solver.validate().map_err(PeridynError::InvalidConfig)?;
        Ok(solver)
    }

    /// `steps` steps with the default step size and damping factor.
    pub fn with_steps(steps: u32) -> PeridynResult<Self> {
        Self::new(steps, DEFAULT_DR_STEPSIZE, DEFAULT_DR_DAMPING_FACTOR)
    }

    fn validate(&self) -> Result<(), String> {
        if self.steps == 0 {
            return Err("step count must be positive".into());
        }
        if !(self.stepsize.is_finite() && self.stepsize > 0.0) {
            return Err(format!("step size must be positive, got {}", self.stepsize));
        }
        if !(self.damping_factor.is_finite() && self.damping_factor > 0.0) {
            return Err(format!(
                "damping factor must be positive, got {}",
                self.damping_factor
            ));
        }
        Ok(())
    }

    /// Fictitious mass of a point with bulk modulus `k` and horizon `delta`.
    #[inline]
    pub fn fictitious_mass(&self, k: f64, delta: f64) -> f64 {
        self.damping_factor * 6.0 * k * self.stepsize * self.stepsize / (delta * delta / 3.0)
    }
}

impl StepScheme for DynamicRelaxation {
    fn name(&self) -> &'static str {
        "dynamic_relaxation"
    }

    fn required_point_fields(&self) -> &'static [PointField] {
        Self::REQUIRED_POINT_FIELDS
    }

    fn required_global_fields(&self) -> &'static [GlobalField] {
        Self::REQUIRED_GLOBAL_FIELDS
    }

    fn check(&self) -> PeridynResult<()> {
        self.validate().map_err(PeridynError::Consistency)
    }

    fn schedule(&self, _data: &DataHandler, _force: &dyn ForceDensity) -> PeridynResult<Schedule> {
        Ok(Schedule {
            steps: self.steps,
            stepsize: self.stepsize,
        })
    }

    fn init_chunk(&self, chunk: &mut BodyChunk, _schedule: &Schedule) -> PeridynResult<()> {
        let n = chunk.n_points();
        let BodyChunk {
            storage,
            parameters,
            ..
        } = chunk;
        for i in 0..n {
            let p = parameters.get(i);
            storage.density_matrix[i] = DVec3::splat(self.fictitious_mass(p.bulk_modulus, p.horizon));
        }
        Ok(())
    }

    fn step(
        &self,
        worker: &mut Worker<'_>,
        n: u32,
        schedule: &Schedule,
        options: &RunOptions<'_>,
    ) -> PeridynResult<StepReport> {
        let dt = schedule.stepsize;
        let t = schedule.time_at(n);
        let force = options.force;
        let conditions = options.conditions;
        let first = n == 1;

        worker.map_chunks(|chunk| {
            conditions.apply(chunk, t);
            update_displacement(chunk, dt);
            Ok(())
        })?;

        for &field in force.loc_to_halo_fields() {
            worker.loc_to_halo(field)?;
        }
        let broken = worker.map_chunks(|chunk| force.compute_force_density(chunk))?;
        for &field in force.halo_to_loc_fields() {
            worker.halo_to_loc(field)?;
        }

        let outcome = worker.map_chunks(|chunk| {
            let max_damage = update_damage(chunk);
            check_force_density(chunk)?;
            let cn = chunk_damping_coefficient(chunk, dt);
            chunk.storage.set_global(GlobalField::DampingCoefficient, cn)?;
            if first {
                first_step(chunk, dt);
            } else {
                damped_step(chunk, dt, cn);
            }
            Ok((max_damage, cn))
        })?;

        let mut report = StepReport {
            first_step: first,
            damped: !first,
            ..StepReport::default()
        };
        let chunks = worker.chunk_ids();
        for ((id, broken), (max_damage, cn)) in chunks.into_iter().zip(broken).zip(outcome) {
            if !first {
                worker.emit(n, EventKind::Damping { chunk: id.0, coefficient: cn });
                report.max_damping = Some(report.max_damping.map_or(cn, |m: f64| m.max(cn)));
            }
            if broken > 0 {
                worker.emit(
                    n,
                    EventKind::Damage {
                        chunk: id.0,
                        max_damage,
                        broken_bonds: broken,
                    },
                );
            }
            report.broken_bonds += broken;
            report.max_damage = report.max_damage.max(max_damage);
        }
        Ok(report)
    }
}

/// Adaptive damping coefficient from the sums over all degrees of freedom.
///
/// ```text
/// cn1 = −Σ u²·Δb / (m·Δt·v½_old)   (dofs with v½_old ≠ 0)
/// cn2 = Σ u²
/// ```
///
/// `cn = 2·sqrt(cn1/cn2)` when that ratio is positive, otherwise 0.
/// Values past the critical damping value 2 are reset to [`DR_CN_RESET`].
/// Values in `(DR_CN_RESET, 2]` are capped to it as well, unlike a plain
/// reset of values above 2, so the result always lies in `[0, DR_CN_RESET]`.
pub fn damping_coefficient(
    displacement: &[DVec3],
    b_int: &[DVec3],
    b_int_old: &[DVec3],
    mass: &[DVec3],
    velocity_half_old: &[DVec3],
    dt: f64,
) -> f64 {
    let mut cn1 = 0.0;
    let mut cn2 = 0.0;

    for i in 0..displacement.len() {
        let u = displacement[i].to_array();
        let db = (b_int[i] - b_int_old[i]).to_array();
        let m = mass[i].to_array();
        let vh = velocity_half_old[i].to_array();
        for d in 0..3 {
            let u2 = u[d] * u[d];
            if vh[d] != 0.0 {
                cn1 -= u2 * db[d] / (m[d] * dt * vh[d]);
            }
            cn2 += u2;
        }
    }

    if cn2 == 0.0 {
        return 0.0;
    }
    let ratio = cn1 / cn2;
    if ratio > 0.0 {
        (2.0 * ratio.sqrt()).min(DR_CN_RESET)
    } else {
        0.0
    }
}

fn chunk_damping_coefficient(chunk: &BodyChunk, dt: f64) -> f64 {
    let n = chunk.n_loc();
    let s = &chunk.storage;
    damping_coefficient(
        &s.displacement[..n],
        &s.b_int[..n],
        &s.b_int_old[..n],
        &s.density_matrix[..n],
        &s.velocity_half_old[..n],
        dt,
    )
}

/// Start-up branch: `v½ = ½Δt·(b_int + b_ext)/m`.
fn first_step(chunk: &mut BodyChunk, dt: f64) {
    let n = chunk.n_loc();
    let s = &mut chunk.storage;
    for i in 0..n {
        let b = s.b_int[i] + s.b_ext[i];
        s.velocity_half[i] = 0.5 * dt * b / s.density_matrix[i];
        finish_point(s, i);
    }
}

/// Damped recurrence:
/// `v½ = ((2 − cnΔt)·v½_old + 2Δt·(b_int + b_ext)/m) / (2 + cnΔt)`.
fn damped_step(chunk: &mut BodyChunk, dt: f64, cn: f64) {
    let n = chunk.n_loc();
    let s = &mut chunk.storage;
    let (keep, scale) = (2.0 - cn * dt, 2.0 + cn * dt);
    for i in 0..n {
        let b = s.b_int[i] + s.b_ext[i];
        s.velocity_half[i] = (keep * s.velocity_half_old[i] + 2.0 * dt * b / s.density_matrix[i]) / scale;
        finish_point(s, i);
    }
}

/// `v = ½(v½_old + v½)`, `v½_old ← v½`, `b_int_old ← b_int`.
#[inline]
fn finish_point(s: &mut ChunkStorage, i: usize) {
    s.velocity[i] = 0.5 * (s.velocity_half_old[i] + s.velocity_half[i]);
    s.velocity_half_old[i] = s.velocity_half[i];
    s.b_int_old[i] = s.b_int[i];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dofs(n: usize, value: DVec3) -> Vec<DVec3> {
        vec![value; n]
    }

    #[test]
    fn zero_displacement_gives_zero_damping() {
        let zero = dofs(4, DVec3::ZERO);
        let one = dofs(4, DVec3::ONE);
        assert_eq!(damping_coefficient(&zero, &one, &zero, &one, &one, 1.0), 0.0);
    }

    #[test]
    fn resting_history_is_skipped() {
        // v½_old = 0 everywhere: cn1 stays 0, so the ratio is not positive.
        let u = dofs(3, DVec3::splat(0.1));
        let b = dofs(3, DVec3::splat(-5.0));
        let zero = dofs(3, DVec3::ZERO);
        let m = dofs(3, DVec3::ONE);
        assert_eq!(damping_coefficient(&u, &b, &zero, &m, &zero, 1.0), 0.0);
    }

    #[test]
    fn stiffening_response_is_damped() {
        // Force drops while the point moves forward.
        let u = dofs(1, DVec3::new(1.0, 0.0, 0.0));
        let b = dofs(1, DVec3::new(-0.25, 0.0, 0.0));
        let b_old = dofs(1, DVec3::ZERO);
        let m = dofs(1, DVec3::ONE);
        let vh = dofs(1, DVec3::new(1.0, 0.0, 0.0));
        // cn1 = 0.25, cn2 = 1, cn = 2·sqrt(0.25) = 1
        let cn = damping_coefficient(&u, &b, &b_old, &m, &vh, 1.0);
        assert!((cn - 1.0).abs() < 1e-15);
    }

    #[test]
    fn large_coefficient_is_reset() {
        let u = dofs(1, DVec3::new(1.0, 0.0, 0.0));
        let b = dofs(1, DVec3::new(-4.0, 0.0, 0.0));
        let b_old = dofs(1, DVec3::ZERO);
        let m = dofs(1, DVec3::ONE);
        let vh = dofs(1, DVec3::new(1.0, 0.0, 0.0));
        // cn = 2·sqrt(4) = 4 > 2
        assert_eq!(damping_coefficient(&u, &b, &b_old, &m, &vh, 1.0), DR_CN_RESET);
    }

    #[test]
    fn near_critical_coefficient_is_capped() {
        let u = dofs(1, DVec3::new(1.0, 0.0, 0.0));
        let b = dofs(1, DVec3::new(-0.9801, 0.0, 0.0));
        let b_old = dofs(1, DVec3::ZERO);
        let m = dofs(1, DVec3::ONE);
        let vh = dofs(1, DVec3::new(1.0, 0.0, 0.0));
        // cn = 2·sqrt(0.9801) = 1.98, between the reset value and 2
        assert_eq!(damping_coefficient(&u, &b, &b_old, &m, &vh, 1.0), DR_CN_RESET);
    }

    #[test]
    fn softening_response_is_undamped() {
        let u = dofs(1, DVec3::new(1.0, 0.0, 0.0));
        let b = dofs(1, DVec3::new(3.0, 0.0, 0.0));
        let b_old = dofs(1, DVec3::ZERO);
        let m = dofs(1, DVec3::ONE);
        let vh = dofs(1, DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(damping_coefficient(&u, &b, &b_old, &m, &vh, 1.0), 0.0);
    }

    #[test]
    fn fictitious_mass_formula() {
        let dr = DynamicRelaxation::new(1, 2.0, 0.5).unwrap();
        // 0.5 · 6 · 3 · 4 / (9/3) = 12
        assert!((dr.fictitious_mass(3.0, 3.0) - 12.0).abs() < 1e-12);
    }
}
