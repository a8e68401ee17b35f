//! Velocity Verlet (explicit central difference) time integration.
//!
//! # Algorithm
//!
//! Per step `n`, with `t = nΔt`:
//!
//! ```text
//! v½ = v + ½Δt·a
//! apply conditions(t)
//! u += Δt·v½,  x += Δt·v½
//! exchange loc → halo
//! b_int = force density
//! exchange halo → loc
//! damage
//! a = (b_int + b_ext) / ρ
//! v = v½ + ½Δt·a
//! ```
//!
//! Without an explicit step size, `Δt` is the smallest stable step over all
//! points, `sqrt(2ρ / Σ_j V_j c / L_ij)`, scaled by the safety factor.

use peridyn_telemetry::EventKind;
use peridyn_types::constants::DEFAULT_SAFETY_FACTOR;
use peridyn_types::{PeridynError, PeridynResult};

use crate::chunk::BodyChunk;
use crate::damage::{update_damage, DamageReport};
use crate::data_handler::DataHandler;
use crate::force::ForceDensity;
use crate::kinematics::{check_force_density, update_displacement};
use crate::run::RunOptions;
use crate::storage::{GlobalField, PointField};
use crate::strategy::{Schedule, StepReport, StepScheme};
use crate::worker::Worker;

/// Explicit central-difference time solver.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityVerlet {
    /// Number of steps (exclusive with `time`).
    pub steps: Option<u32>,
    /// Simulated time span (exclusive with `steps`).
    pub time: Option<f64>,
    /// Fixed step size; derived from the stable step when absent.
    pub stepsize: Option<f64>,
    /// Factor in `(0, 1]` applied to the derived stable step.
    pub safety_factor: f64,
}

impl VelocityVerlet {
    /// Point fields the solver needs.
    pub const REQUIRED_POINT_FIELDS: &'static [PointField] = &[
        PointField::Position,
        PointField::Displacement,
        PointField::Velocity,
        PointField::VelocityHalf,
        PointField::Acceleration,
        PointField::BInt,
        PointField::BExt,
        PointField::Damage,
        PointField::NActiveBonds,
    ];

    /// Global fields the solver needs.
    pub const REQUIRED_GLOBAL_FIELDS: &'static [GlobalField] = &[];

    /// A solver taking `steps` steps of the derived stable size.
    pub fn with_steps(steps: u32) -> PeridynResult<Self> {
        Self::new(Some(steps), None, None, DEFAULT_SAFETY_FACTOR)
    }

    /// A solver covering `time` with steps of the derived stable size.
    pub fn with_time(time: f64) -> PeridynResult<Self> {
        Self::new(None, Some(time), None, DEFAULT_SAFETY_FACTOR)
    }

    /// Validating constructor.
    ///
    /// Exactly one of `steps` and `time` must be given.
    pub fn new(steps: Option<u32>, time: Option<f64>, stepsize: Option<f64>, safety_factor: f64) -> PeridynResult<Self> {
        let solver = Self {
            steps,
            time,
            stepsize,
            safety_factor,
        };
        solver.validate().map_err(PeridynError::InvalidConfig)?;
        Ok(solver)
    }

    /// Returns a copy with a fixed step size.
    pub fn stepsize(mut self, stepsize: f64) -> PeridynResult<Self> {
        self.stepsize = Some(stepsize);
        self.validate().map_err(PeridynError::InvalidConfig)?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), String> {
        match (self.steps, self.time) {
            (Some(_), Some(_)) => return Err("give either a step count or a time span, not both".into()),
            (None, None) => return Err("a step count or a time span is required".into()),
            (Some(0), None) => return Err("step count must be positive".into()),
            (None, Some(t)) if !(t.is_finite() && t > 0.0) => {
                return Err(format!("time span must be positive, got {t}"));
            }
            _ => {}
        }
        if let Some(dt) = self.stepsize {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(format!("step size must be positive, got {dt}"));
            }
        }
        if !(self.safety_factor > 0.0 && self.safety_factor <= 1.0) {
            return Err(format!(
                "safety factor must be in (0, 1], got {}",
                self.safety_factor
            ));
        }
        Ok(())
    }
}

impl StepScheme for VelocityVerlet {
    fn name(&self) -> &'static str {
        "velocity_verlet"
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

    fn schedule(&self, data: &DataHandler, force: &dyn ForceDensity) -> PeridynResult<Schedule> {
        let stepsize = match self.stepsize {
            Some(dt) => dt,
            None => {
                let critical = data
                    .chunks()
                    .iter()
                    .map(|c| force.critical_time_step(c))
                    .fold(f64::INFINITY, f64::min);
                if !critical.is_finite() {
                    return Err(PeridynError::InvalidConfig(
                        "no bonds to derive a stable time step from; give a step size".into(),
                    ));
                }
                tracing::debug!(critical, safety_factor = self.safety_factor, "stable time step");
                critical * self.safety_factor
            }
        };

        match (self.steps, self.time) {
            (Some(steps), _) => Ok(Schedule { steps, stepsize }),
            (None, Some(time)) => {
                // Shrink Δt slightly so the last step lands on `time`.
                let steps = (time / stepsize).ceil().max(1.0) as u32;
                Ok(Schedule {
                    steps,
                    stepsize: time / steps as f64,
                })
            }
            (None, None) => Err(PeridynError::Consistency(
                "a step count or a time span is required".into(),
            )),
        }
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

        worker.map_chunks(|chunk| {
            update_velocity_half(chunk, dt);
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

        let max_damage = worker.map_chunks(|chunk| {
            let max_damage = update_damage(chunk);
            check_force_density(chunk)?;
            update_acceleration_and_velocity(chunk, dt);
            Ok(max_damage)
        })?;

        let mut report = StepReport::default();
        for ((id, broken), max_damage) in worker.chunk_ids().into_iter().zip(broken).zip(max_damage) {
            let damage = DamageReport {
                max_damage,
                broken_bonds: broken,
            };
            if damage.broken_bonds > 0 {
                worker.emit(
                    n,
                    EventKind::Damage {
                        chunk: id.0,
                        max_damage: damage.max_damage,
                        broken_bonds: damage.broken_bonds,
                    },
                );
            }
            report.broken_bonds += damage.broken_bonds;
            report.max_damage = report.max_damage.max(damage.max_damage);
        }
        Ok(report)
    }
}

/// `v½ = v + ½Δt·a` for owned points.
fn update_velocity_half(chunk: &mut BodyChunk, dt: f64) {
    let n_loc = chunk.n_loc();
    let s = &mut chunk.storage;
    for i in 0..n_loc {
        s.velocity_half[i] = s.velocity[i] + 0.5 * dt * s.acceleration[i];
    }
}

/// `a = (b_int + b_ext)/ρ`, `v = v½ + ½Δt·a` for owned points.
fn update_acceleration_and_velocity(chunk: &mut BodyChunk, dt: f64) {
    let n_loc = chunk.n_loc();
    let BodyChunk {
        storage: s,
        parameters,
        ..
    } = chunk;
    for i in 0..n_loc {
        let rho = parameters.get(i).density;
        let a = (s.b_int[i] + s.b_ext[i]) / rho;
        s.acceleration[i] = a;
        s.velocity[i] = s.velocity_half[i] + 0.5 * dt * a;
    }
}
