//! Solver configuration.
//!
//! The serializable description of a time solver. Turned into a validated
//! [`TimeSolver`](crate::time_solver::TimeSolver) with
//! [`TimeSolver::from_config`](crate::time_solver::TimeSolver::from_config).
//!
//! ```toml
//! [solver]
//! kind = "dynamic_relaxation"
//! steps = 2000
//! stepsize = 1.0
//! ```

use peridyn_types::constants::{DEFAULT_DR_DAMPING_FACTOR, DEFAULT_DR_STEPSIZE, DEFAULT_SAFETY_FACTOR};
use serde::{Deserialize, Serialize};

/// Configuration for the time solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolverConfig {
    /// Explicit central-difference integration.
    VelocityVerlet {
        /// Number of steps (exclusive with `time`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        steps: Option<u32>,
        /// Simulated time span (exclusive with `steps`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
        /// Fixed step size. Derived from the stable step when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stepsize: Option<f64>,
        /// Factor applied to the derived stable step.
        #[serde(default = "default_safety_factor")]
        safety_factor: f64,
    },

    /// Adaptive dynamic relaxation.
    DynamicRelaxation {
        /// Number of relaxation steps.
        steps: u32,
        /// Fictitious time step.
        #[serde(default = "default_dr_stepsize")]
        stepsize: f64,
        /// Fictitious mass scaling.
        #[serde(default = "default_dr_damping_factor")]
        damping_factor: f64,
    },
}

fn default_safety_factor() -> f64 {
    DEFAULT_SAFETY_FACTOR
}

fn default_dr_stepsize() -> f64 {
    DEFAULT_DR_STEPSIZE
}

fn default_dr_damping_factor() -> f64 {
    DEFAULT_DR_DAMPING_FACTOR
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::DynamicRelaxation {
            steps: 1000,
            stepsize: DEFAULT_DR_STEPSIZE,
            damping_factor: DEFAULT_DR_DAMPING_FACTOR,
        }
    }
}

impl SolverConfig {
    /// A short explicit run for debugging.
    pub fn debug() -> Self {
        Self::VelocityVerlet {
            steps: Some(10),
            time: None,
            stepsize: None,
            safety_factor: DEFAULT_SAFETY_FACTOR,
        }
    }

    /// A long, heavily converged relaxation.
    pub fn quasi_static() -> Self {
        Self::DynamicRelaxation {
            steps: 20_000,
            stepsize: DEFAULT_DR_STEPSIZE,
            damping_factor: DEFAULT_DR_DAMPING_FACTOR,
        }
    }

    /// Name of the configured solver.
    pub fn name(&self) -> &'static str {
        match self {
            Self::VelocityVerlet { .. } => "velocity_verlet",
            Self::DynamicRelaxation { .. } => "dynamic_relaxation",
        }
    }
}
