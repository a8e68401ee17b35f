//! Run events.
//!
//! Serialized with an `event` tag, e.g.
//! `{"timestep":3,"kind":{"event":"damping","chunk":1,"coefficient":0.4}}`.

use serde::{Deserialize, Serialize};

/// One event of a run, stamped with the step it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    /// Timestep number (0 before the first step).
    pub timestep: u32,
    /// Event payload.
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// Setup finished, stepping is about to begin.
    RunBegin {
        /// Time solver name.
        solver: String,
        /// Total number of chunks across all bodies.
        chunks: u32,
        /// Total number of owned points across all chunks.
        points: u64,
        /// Number of steps that will be taken.
        steps: u32,
        /// Time step size.
        stepsize: f64,
    },

    /// Timestep started.
    TimestepBegin {
        /// Simulation time for this step.
        sim_time: f64,
    },

    /// Timestep completed on every chunk.
    TimestepEnd {
        /// Wall-clock time for the entire timestep (seconds).
        wall_time: f64,
    },

    /// Adaptive damping coefficient computed by one chunk.
    Damping {
        /// Chunk that computed the coefficient.
        chunk: u32,
        /// The clamped coefficient `cn`.
        coefficient: f64,
    },

    /// Damage summary for one chunk.
    Damage {
        /// Chunk the summary belongs to.
        chunk: u32,
        /// Largest point damage in the chunk.
        max_damage: f64,
        /// Number of bonds broken during this step.
        broken_bonds: u64,
    },

    /// An export call failed; the run continues.
    ExportFailed {
        /// Chunk whose export failed.
        chunk: u32,
        /// Error message from the exporter.
        message: String,
    },

    /// The run finished all configured steps.
    RunEnd {
        /// Wall-clock time for the whole run (seconds).
        wall_time: f64,
    },
}

impl SimulationEvent {
    pub fn new(timestep: u32, kind: EventKind) -> Self {
        Self { timestep, kind }
    }

    /// Chunk the event is about, for per-chunk events.
    pub fn chunk(&self) -> Option<u32> {
        match self.kind {
            EventKind::Damping { chunk, .. }
            | EventKind::Damage { chunk, .. }
            | EventKind::ExportFailed { chunk, .. } => Some(chunk),
            _ => None,
        }
    }

    /// Returns true for the events that open and close a run.
    pub fn is_run_level(&self) -> bool {
        matches!(self.kind, EventKind::RunBegin { .. } | EventKind::RunEnd { .. })
    }
}
