//! Step scheme trait — the shared interface of the time solvers.
//!
//! The run driver calls these methods in order:
//!
//! ```text
//! scheme.check()?;
//! let schedule = scheme.schedule(data, force)?;
//! for chunk in chunks { scheme.init_chunk(chunk, &schedule)?; }
//! for n in 1..=schedule.steps {
//!     scheme.step(worker, n, &schedule, options)?;
//! }
//! ```
//!
//! # Implementations
//!
//! - [`VelocityVerlet`](crate::velocity_verlet::VelocityVerlet) — explicit central difference
//! - [`DynamicRelaxation`](crate::dynamic_relaxation::DynamicRelaxation) — adaptive dynamic relaxation

use peridyn_types::PeridynResult;

use crate::chunk::BodyChunk;
use crate::data_handler::DataHandler;
use crate::force::ForceDensity;
use crate::run::RunOptions;
use crate::storage::{GlobalField, PointField};
use crate::worker::Worker;

/// Resolved step count and step size of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    /// Number of steps.
    pub steps: u32,
    /// Time step `Δt`.
    pub stepsize: f64,
}

impl Schedule {
    /// Simulation time after step `n`.
    #[inline]
    pub fn time_at(&self, n: u32) -> f64 {
        n as f64 * self.stepsize
    }

    /// Simulation time after the last step.
    pub fn end_time(&self) -> f64 {
        self.time_at(self.steps)
    }
}

/// Outcome of one step on one worker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepReport {
    /// Bonds broken during the step.
    pub broken_bonds: u64,
    /// Largest point damage after the step.
    pub max_damage: f64,
    /// Largest damping coefficient applied, if the scheme damps.
    pub max_damping: Option<f64>,
    /// The step took the undamped start-up branch.
    pub first_step: bool,
    /// The step took the damped recurrence.
    pub damped: bool,
}

/// Trait for time integration schemes.
pub trait StepScheme: Sync {
    /// Returns the scheme's name.
    fn name(&self) -> &'static str;

    /// Point fields every chunk must allocate.
    fn required_point_fields(&self) -> &'static [PointField];

    /// Global fields every chunk must allocate.
    fn required_global_fields(&self) -> &'static [GlobalField];

    /// Re-validates parameters before stepping.
    ///
    /// Fails with [`PeridynError::Consistency`](peridyn_types::PeridynError::Consistency).
    fn check(&self) -> PeridynResult<()>;

    /// Resolves the step count and step size.
    fn schedule(&self, data: &DataHandler, force: &dyn ForceDensity) -> PeridynResult<Schedule>;

    /// One-time per-chunk initialization (e.g., fictitious masses).
    fn init_chunk(&self, _chunk: &mut BodyChunk, _schedule: &Schedule) -> PeridynResult<()> {
        Ok(())
    }

    /// Advances every chunk of `worker` by step `n`.
    fn step(
        &self,
        worker: &mut Worker<'_>,
        n: u32,
        schedule: &Schedule,
        options: &RunOptions<'_>,
    ) -> PeridynResult<StepReport>;
}
