//! # peridyn-io
//!
//! Job input/output for the peridyn engine.
//!
//! - [`JobConfig`] — TOML description of bodies, conditions, solver and run
//! - [`validate_job`] — rejects inconsistent jobs before anything is built
//! - [`Job`] — a validated job turned into bodies and a time solver
//! - [`JsonExporter`] — per-chunk JSON snapshots plus a run summary

pub mod job;
pub mod json_exporter;
pub mod runner;
pub mod validator;

pub use job::{BodyConfig, Geometry, JobConfig, MaterialConfig, Precrack, RegionSet, RunConfig, SetMaterial};
pub use json_exporter::JsonExporter;
pub use runner::{build_body, Job, JobReport};
pub use validator::validate_job;
