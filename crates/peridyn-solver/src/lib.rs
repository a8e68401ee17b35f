//! # peridyn-solver
//!
//! Chunk storage, halo exchange, and the time integration loop.
//!
//! ## Key Types
//!
//! - [`DataHandler`] — All chunks of a run plus the halo [`ExchangePlan`]
//! - [`BodyChunk`] — One partition with its local bonds, fields and parameters
//! - [`TimeSolver`] — Velocity Verlet or adaptive dynamic relaxation
//! - [`RunOptions`] — Collaborators (force, conditions, export) and execution mode
//! - [`StepScheme`] — Shared stepping interface of the time solvers
//!
//! ## Execution
//!
//! [`Execution::Pooled`] runs every phase as a rayon parallel loop over
//! chunks. [`Execution::Ranks`] gives each worker rank its own thread and
//! moves halo data only as messages. Both produce bit-identical fields for
//! the same chunk count.

pub mod chunk;
pub mod conditions;
pub mod config;
pub mod damage;
pub mod data_handler;
pub mod dynamic_relaxation;
pub mod export;
pub mod force;
pub mod halo;
pub mod kinematics;
pub mod run;
pub mod storage;
pub mod strategy;
pub mod time_solver;
pub mod velocity_verlet;
pub mod worker;

pub use chunk::BodyChunk;
pub use conditions::{Axis, BoundaryConditions, ConditionValue, Conditions, NoConditions, PointCondition};
pub use config::SolverConfig;
pub use data_handler::{BodyInfo, DataHandler};
pub use dynamic_relaxation::DynamicRelaxation;
pub use export::{ChunkSnapshot, Exporter, MemoryExporter, NoExport};
pub use force::{BondForce, ForceDensity};
pub use halo::{exchange_halo_to_loc, exchange_loc_to_halo, ExchangePlan, HaloTransfer};
pub use run::{Execution, RunContext, RunOptions, RunSummary};
pub use storage::{ChunkStorage, GlobalField, PointField};
pub use strategy::{Schedule, StepReport, StepScheme};
pub use time_solver::TimeSolver;
pub use velocity_verlet::VelocityVerlet;
pub use worker::Worker;
