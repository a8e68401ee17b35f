//! Event sinks.
//!
//! A sink runs on the thread that flushes the bus, never on a worker.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::{EventKind, SimulationEvent};

/// Consumer of flushed run events.
pub trait EventSink: Send {
    fn handle(&mut self, event: &SimulationEvent);

    /// Called once by [`EventBus::shutdown`](crate::EventBus::shutdown).
    fn finalize(&mut self) {}

    fn name(&self) -> &str;
}

/// Keeps every event in a buffer shared between clones.
///
/// Register one clone with the bus and read the events through another.
#[derive(Clone, Default)]
pub struct VecSink {
    buffer: Arc<Mutex<Vec<SimulationEvent>>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far, in dispatch order.
    pub fn events(&self) -> Vec<SimulationEvent> {
        self.buffer.lock().clone()
    }

    /// Received events about chunk `chunk`.
    pub fn for_chunk(&self, chunk: u32) -> Vec<SimulationEvent> {
        self.buffer
            .lock()
            .iter()
            .filter(|e| e.chunk() == Some(chunk))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }
}

impl EventSink for VecSink {
    fn handle(&mut self, event: &SimulationEvent) {
        self.buffer.lock().push(event.clone());
    }

    fn name(&self) -> &str {
        "vec"
    }
}

/// Forwards events to `tracing`.
///
/// Run begin and end log at `info`, export failures at `warn`, the
/// per-step traffic at `debug`.
#[derive(Debug, Default)]
pub struct TracingSink {
    handled: u64,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for TracingSink {
    fn handle(&mut self, event: &SimulationEvent) {
        self.handled += 1;
        let step = event.timestep;
        match &event.kind {
            EventKind::ExportFailed { chunk, message } => {
                tracing::warn!(step, chunk, %message, "snapshot export failed");
            }
            kind if event.is_run_level() => tracing::info!(step, event = ?kind, "run event"),
            kind => tracing::debug!(step, event = ?kind, "step event"),
        }
    }

    fn finalize(&mut self) {
        tracing::debug!(events = self.handled, "telemetry closed");
    }

    fn name(&self) -> &str {
        "tracing"
    }
}
