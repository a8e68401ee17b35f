//! Job runner — turns a validated [`JobConfig`] into bodies, a time
//! solver and a finished run.

use std::path::{Path, PathBuf};

use glam::DVec3;
use peridyn_discretization::generators::{uniform_box, uniform_cylinder};
use peridyn_discretization::Body;
use peridyn_material::{MaterialDatabase, MaterialSpec};
use peridyn_solver::{DataHandler, Exporter, NoExport, RunOptions, RunSummary, TimeSolver};
use peridyn_telemetry::EventEmitter;
use peridyn_types::constants::DEFAULT_HORIZON_FACTOR;
use peridyn_types::{PeridynError, PeridynResult};

use crate::job::{BodyConfig, Geometry, JobConfig, MaterialConfig};
use crate::json_exporter::JsonExporter;
use crate::validator::validate_job;

/// A validated job, ready to be decomposed and run.
#[derive(Debug)]
pub struct Job {
    config: JobConfig,
    bodies: Vec<Body>,
    solver: TimeSolver,
}

/// Outcome of [`Job::run`].
#[derive(Debug)]
pub struct JobReport {
    /// Run summary.
    pub summary: RunSummary,
    /// Final state of every chunk.
    pub data: DataHandler,
    /// Location of `summary.json`, if the job has an output directory.
    pub summary_path: Option<PathBuf>,
}

impl Job {
    /// Validates `config` and builds its bodies and solver.
    pub fn from_config(config: JobConfig) -> PeridynResult<Self> {
        validate_job(&config)?;
        let materials = MaterialDatabase::with_defaults();
        let bodies = config
            .bodies
            .iter()
            .map(|b| build_body(b, &materials))
            .collect::<PeridynResult<Vec<_>>>()?;
        let solver = TimeSolver::from_config(&config.solver)?;
        Ok(Self {
            config,
            bodies,
            solver,
        })
    }

    /// Reads, validates and builds a job from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> PeridynResult<Self> {
        Self::from_config(JobConfig::from_file(path)?)
    }

    /// The job configuration.
    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Bodies in configuration order.
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// The time solver.
    pub fn solver(&self) -> &TimeSolver {
        &self.solver
    }

    /// Decomposes every body into its chunks.
    pub fn decompose(&self) -> PeridynResult<DataHandler> {
        let pairs: Vec<(&Body, usize)> = self
            .bodies
            .iter()
            .enumerate()
            .map(|(b, body)| (body, self.config.chunks_of(b)))
            .collect();
        DataHandler::multibody(&pairs, self.config.run.strategy, &self.solver)
    }

    /// Decomposes and runs the job.
    ///
    /// With an output directory, snapshots are written on the export
    /// cadence and the summary goes to `summary.json`.
    pub fn run(&self, events: Option<EventEmitter>) -> PeridynResult<JobReport> {
        let mut data = self.decompose()?;

        let json = match &self.config.output {
            Some(dir) => Some(JsonExporter::new(dir)?),
            None => None,
        };
        let exporter: &dyn Exporter = match &json {
            Some(json) => json,
            None => &NoExport,
        };

        let options = RunOptions {
            export_every: if json.is_some() { self.config.run.export_every } else { 0 },
            execution: self.config.run.execution,
            conditions: &self.config.conditions,
            exporter,
            events,
            ..RunOptions::default()
        };

        tracing::info!(job = %self.config.name, solver = self.solver.name(), "job starting");
        let summary = self.solver.run(&mut data, &options)?;

        let summary_path = match &json {
            Some(json) => Some(json.write_summary(&summary)?),
            None => None,
        };
        Ok(JobReport {
            summary,
            data,
            summary_path,
        })
    }
}

/// Generates the points of `config` and applies materials, point sets,
/// failure permits and precracks.
pub fn build_body(config: &BodyConfig, materials: &MaterialDatabase) -> PeridynResult<Body> {
    let mut body = match &config.geometry {
        Geometry::Box { size, spacing, center } => Body::from_cloud(
            config.name.clone(),
            uniform_box(size[0], size[1], size[2], *spacing, DVec3::from_array(*center))?,
        )?,
        Geometry::Cylinder {
            radius,
            height,
            spacing,
            center,
        } => Body::from_cloud(
            config.name.clone(),
            uniform_cylinder(*radius, *height, *spacing, DVec3::from_array(*center))?,
        )?,
        Geometry::Points { position, volume } => Body::new(
            config.name.clone(),
            position.iter().map(|p| DVec3::from_array(*p)).collect(),
            volume.clone(),
        )?,
    };

    let spacing = config.geometry.spacing();
    body.set_material(&resolve_material(&config.name, &config.material, spacing, materials)?)?;

    for region in &config.point_sets {
        let count = body.point_set_where(region.name.clone(), |p| region.contains(p))?;
        if count == 0 {
            tracing::warn!(body = %config.name, set = %region.name, "point set selects no points");
        }
    }
    for entry in &config.set_materials {
        let spec = resolve_material(&config.name, &entry.material, spacing, materials)?;
        body.set_material_for(&entry.set, &spec)?;
    }
    for set in &config.no_failure {
        body.no_failure(set)?;
    }
    for crack in &config.precracks {
        body.precrack(&crack.a, &crack.b)?;
    }

    tracing::debug!(
        body = %config.name,
        points = body.n_points(),
        sets = config.point_sets.len(),
        heterogeneous = body.is_heterogeneous(),
        "body built"
    );
    Ok(body)
}

fn resolve_material(
    body: &str,
    material: &MaterialConfig,
    spacing: Option<f64>,
    materials: &MaterialDatabase,
) -> PeridynResult<MaterialSpec> {
    match material {
        MaterialConfig::Preset { preset, horizon } => {
            let horizon = horizon
                .or_else(|| spacing.map(|s| DEFAULT_HORIZON_FACTOR * s))
                .ok_or_else(|| PeridynError::InvalidConfig(format!("body '{body}': material '{preset}' needs a horizon")))?;
            materials.preset(preset, horizon).ok_or_else(|| {
                PeridynError::InvalidConfig(format!("body '{body}': unknown material '{preset}'"))
            })
        }
        MaterialConfig::Inline(spec) => Ok(spec.clone()),
    }
}
