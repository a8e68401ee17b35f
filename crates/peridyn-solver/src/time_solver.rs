//! Time solver — the closed set of integration schemes a run can use.

use peridyn_types::PeridynResult;

use crate::config::SolverConfig;
use crate::data_handler::DataHandler;
use crate::dynamic_relaxation::DynamicRelaxation;
use crate::run::{execute, RunOptions, RunSummary};
use crate::storage::{GlobalField, PointField};
use crate::strategy::StepScheme;
use crate::velocity_verlet::VelocityVerlet;

/// A validated time solver.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeSolver {
    VelocityVerlet(VelocityVerlet),
    DynamicRelaxation(DynamicRelaxation),
}

impl TimeSolver {
    /// Validates `config` and builds the solver it describes.
    ///
    /// Fails with [`PeridynError::InvalidConfig`](peridyn_types::PeridynError::InvalidConfig).
    pub fn from_config(config: &SolverConfig) -> PeridynResult<Self> {
        Ok(match *config {
            SolverConfig::VelocityVerlet {
                steps,
                time,
                stepsize,
                safety_factor,
            } => Self::VelocityVerlet(VelocityVerlet::new(steps, time, stepsize, safety_factor)?),
            SolverConfig::DynamicRelaxation {
                steps,
                stepsize,
                damping_factor,
            } => Self::DynamicRelaxation(DynamicRelaxation::new(steps, stepsize, damping_factor)?),
        })
    }

    fn scheme(&self) -> &dyn StepScheme {
        match self {
            Self::VelocityVerlet(s) => s,
            Self::DynamicRelaxation(s) => s,
        }
    }

    /// Solver name.
    pub fn name(&self) -> &'static str {
        self.scheme().name()
    }

    /// Point fields every chunk must allocate.
    pub fn required_point_fields(&self) -> &'static [PointField] {
        self.scheme().required_point_fields()
    }

    /// Global fields every chunk must allocate.
    pub fn required_global_fields(&self) -> &'static [GlobalField] {
        self.scheme().required_global_fields()
    }

    /// Steps every chunk of `data` through the whole schedule.
    pub fn run(&self, data: &mut DataHandler, options: &RunOptions<'_>) -> PeridynResult<RunSummary> {
        match self {
            Self::VelocityVerlet(s) => execute(s, data, options),
            Self::DynamicRelaxation(s) => execute(s, data, options),
        }
    }
}

impl From<VelocityVerlet> for TimeSolver {
    fn from(solver: VelocityVerlet) -> Self {
        Self::VelocityVerlet(solver)
    }
}

impl From<DynamicRelaxation> for TimeSolver {
    fn from(solver: DynamicRelaxation) -> Self {
        Self::DynamicRelaxation(solver)
    }
}
