//! Result export.
//!
//! The time loop calls [`Exporter::export_results`] for every chunk on the
//! export cadence. A failed export is logged and reported as telemetry;
//! it never stops the run.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use peridyn_types::PeridynResult;

use crate::chunk::BodyChunk;

/// Snapshot sink for chunk results.
pub trait Exporter: Send + Sync {
    /// Writes the public fields of `chunk` at `step` / time `t`.
    fn export_results(&self, chunk: &BodyChunk, step: u32, t: f64) -> PeridynResult<()>;
}

/// Discards every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExport;

impl Exporter for NoExport {
    fn export_results(&self, _chunk: &BodyChunk, _step: u32, _t: f64) -> PeridynResult<()> {
        Ok(())
    }
}

/// Owned-point results of one chunk at one step.
///
/// Fields a solver did not allocate are exported as empty arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSnapshot {
    /// Body name.
    pub body: String,
    /// Run-wide chunk id.
    pub chunk: u32,
    /// Step index (0 = initial state).
    pub step: u32,
    /// Simulation time.
    pub time: f64,
    /// Global ids of the owned points.
    pub point_ids: Vec<u32>,
    pub position: Vec<[f64; 3]>,
    pub displacement: Vec<[f64; 3]>,
    pub velocity: Vec<[f64; 3]>,
    pub damage: Vec<f64>,
}

impl ChunkSnapshot {
    /// Copies the owned rows of `chunk`.
    pub fn capture(chunk: &BodyChunk, step: u32, t: f64) -> Self {
        let n = chunk.n_loc();
        let s = &chunk.storage;
        let rows = |v: &[glam::DVec3]| -> Vec<[f64; 3]> {
            v.iter().take(n).map(|p| p.to_array()).collect()
        };

        Self {
            body: chunk.body_name.clone(),
            chunk: chunk.id().0,
            step,
            time: t,
            point_ids: chunk.handler.loc_point_ids().iter().map(|id| id.0).collect(),
            position: rows(&s.position),
            displacement: rows(&s.displacement),
            velocity: rows(&s.velocity),
            damage: s.damage.iter().take(n).copied().collect(),
        }
    }

    /// Number of points in the snapshot.
    pub fn len(&self) -> usize {
        self.point_ids.len()
    }

    /// Returns true if the snapshot holds no points.
    pub fn is_empty(&self) -> bool {
        self.point_ids.is_empty()
    }
}

/// Keeps every snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryExporter {
    snapshots: Mutex<Vec<ChunkSnapshot>>,
}

impl MemoryExporter {
    /// Creates an empty exporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of all snapshots, ordered by step then chunk.
    pub fn snapshots(&self) -> Vec<ChunkSnapshot> {
        let mut all = self.snapshots.lock().clone();
        all.sort_by_key(|s| (s.step, s.chunk));
        all
    }

    /// Number of snapshots taken.
    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }

    /// Returns true if nothing was exported.
    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().is_empty()
    }
}

impl Exporter for MemoryExporter {
    fn export_results(&self, chunk: &BodyChunk, step: u32, t: f64) -> PeridynResult<()> {
        let snapshot = ChunkSnapshot::capture(chunk, step, t);
        self.snapshots.lock().push(snapshot);
        Ok(())
    }
}
