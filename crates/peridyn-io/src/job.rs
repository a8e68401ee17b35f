//! Job configuration types.
//!
//! A job is read from TOML:
//!
//! ```toml
//! name = "plate_tension"
//! output = "out/plate"
//!
//! [[bodies]]
//! name = "plate"
//! geometry = { kind = "box", size = [1.0, 0.5, 0.125], spacing = 0.0625 }
//! material = { preset = "pmma" }
//! point_sets = [
//!     { name = "left", upper = [-0.45, inf, inf] },
//!     { name = "right", lower = [0.45, -inf, -inf] },
//! ]
//! no_failure = ["left", "right"]
//!
//! [[conditions.velocity]]
//! set = "right"
//! axis = "x"
//! value = { ramp = { rate = 0.01 } }
//!
//! [solver]
//! kind = "velocity_verlet"
//! steps = 2000
//!
//! [run]
//! chunks = 4
//! execution = { mode = "ranks", ranks = 2 }
//! export_every = 100
//! ```

use std::path::{Path, PathBuf};

use glam::DVec3;
use serde::{Deserialize, Serialize};
use peridyn_discretization::PartitionStrategy;
use peridyn_material::MaterialSpec;
use peridyn_solver::{BoundaryConditions, Execution, SolverConfig};
use peridyn_types::constants::DEFAULT_EXPORT_EVERY;
use peridyn_types::{PeridynError, PeridynResult};

/// Complete description of a simulation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name, used in logs and the summary file.
    #[serde(default = "default_job_name")]
    pub name: String,
    /// Directory receiving snapshots and the run summary. No output when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// Bodies stepped together. They do not interact.
    pub bodies: Vec<BodyConfig>,
    /// Boundary and initial conditions.
    #[serde(default)]
    pub conditions: BoundaryConditions,
    /// Time solver.
    pub solver: SolverConfig,
    /// Decomposition and execution settings.
    #[serde(default)]
    pub run: RunConfig,
}

fn default_job_name() -> String {
    "job".to_string()
}

impl JobConfig {
    /// Parses a job from TOML text.
    pub fn from_toml_str(text: &str) -> PeridynResult<Self> {
        toml::from_str(text).map_err(|e| PeridynError::Serialization(format!("job config: {e}")))
    }

    /// Reads a job from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> PeridynResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Serializes the job back to TOML.
    pub fn to_toml_string(&self) -> PeridynResult<String> {
        toml::to_string(self).map_err(|e| PeridynError::Serialization(format!("job config: {e}")))
    }

    /// Number of chunks of body `b`, falling back to the run default.
    pub fn chunks_of(&self, b: usize) -> usize {
        self.bodies
            .get(b)
            .and_then(|body| body.chunks)
            .unwrap_or(self.run.chunks)
    }

    /// Total number of chunks over all bodies.
    pub fn total_chunks(&self) -> usize {
        (0..self.bodies.len()).map(|b| self.chunks_of(b)).sum()
    }
}

/// One body of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    /// Unique body name.
    pub name: String,
    /// Point cloud.
    pub geometry: Geometry,
    /// Material of every point.
    pub material: MaterialConfig,
    /// Materials overriding `material` on named point sets, applied in
    /// order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_materials: Vec<SetMaterial>,
    /// Named point sets, selected by axis-aligned regions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub point_sets: Vec<RegionSet>,
    /// Point sets whose bonds never break.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub no_failure: Vec<String>,
    /// Pairs of point sets that start without bonds between them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precracks: Vec<Precrack>,
    /// Chunk count for this body; `run.chunks` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
}

/// Point cloud of a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Geometry {
    /// Uniform grid filling a box.
    Box {
        size: [f64; 3],
        spacing: f64,
        #[serde(default)]
        center: [f64; 3],
    },
    /// Uniform grid filling a cylinder along z.
    Cylinder {
        radius: f64,
        height: f64,
        spacing: f64,
        #[serde(default)]
        center: [f64; 3],
    },
    /// Explicit points.
    Points { position: Vec<[f64; 3]>, volume: Vec<f64> },
}

impl Geometry {
    /// Grid spacing of generated geometries.
    pub fn spacing(&self) -> Option<f64> {
        match *self {
            Geometry::Box { spacing, .. } | Geometry::Cylinder { spacing, .. } => Some(spacing),
            Geometry::Points { .. } => None,
        }
    }
}

/// Material of a body or point set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaterialConfig {
    /// A named preset of the material database.
    ///
    /// `horizon` defaults to 3.015 point spacings.
    Preset {
        preset: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        horizon: Option<f64>,
    },
    /// Parameters given in full.
    Inline(MaterialSpec),
}

/// A material applied to one point set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetMaterial {
    pub set: String,
    pub material: MaterialConfig,
}

/// A named point set: every point with `lower ≤ x ≤ upper` per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSet {
    pub name: String,
    #[serde(default = "unbounded_below")]
    pub lower: [f64; 3],
    #[serde(default = "unbounded_above")]
    pub upper: [f64; 3],
}

fn unbounded_below() -> [f64; 3] {
    [f64::NEG_INFINITY; 3]
}

fn unbounded_above() -> [f64; 3] {
    [f64::INFINITY; 3]
}

impl RegionSet {
    /// Returns true if `p` lies inside the region, bounds included.
    pub fn contains(&self, p: DVec3) -> bool {
        let lower = DVec3::from_array(self.lower);
        let upper = DVec3::from_array(self.upper);
        p.cmpge(lower).all() && p.cmple(upper).all()
    }
}

/// Two point sets separated by a crack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precrack {
    pub a: String,
    pub b: String,
}

/// Decomposition and execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Default chunk count per body.
    #[serde(default = "default_chunks")]
    pub chunks: usize,
    /// Partitioning strategy.
    #[serde(default)]
    pub strategy: PartitionStrategy,
    /// Thread mapping.
    #[serde(default)]
    pub execution: Execution,
    /// Export every n-th step plus the initial state; 0 disables export.
    #[serde(default = "default_export_every")]
    pub export_every: u32,
}

fn default_chunks() -> usize {
    1
}

fn default_export_every() -> u32 {
    DEFAULT_EXPORT_EVERY
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            chunks: default_chunks(),
            strategy: PartitionStrategy::default(),
            execution: Execution::default(),
            export_every: DEFAULT_EXPORT_EVERY,
        }
    }
}
