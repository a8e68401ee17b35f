//! Event bus — run events from many worker threads, dispatched on one.
//!
//! Workers hold cloned [`EventEmitter`]s and push events into a
//! `std::sync::mpsc` channel. Sinks are never called from a worker: the
//! thread that owns the [`EventBus`] drains the channel with
//! [`EventBus::flush`], so sinks need not be `Sync`.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::events::SimulationEvent;
use crate::sinks::EventSink;

/// Owner side of the telemetry channel.
pub struct EventBus {
    tx: Sender<SimulationEvent>,
    rx: Receiver<SimulationEvent>,
    sinks: Vec<Box<dyn EventSink>>,
    /// When false, no emitter is handed out and `emit` drops events.
    enabled: bool,
}

/// Producer handle of an [`EventBus`], one clone per worker.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: Sender<SimulationEvent>,
}

impl EventEmitter {
    /// Queues `event`. Events sent after the bus is dropped are lost.
    pub fn emit(&self, event: SimulationEvent) {
        let _ = self.tx.send(event);
    }
}

impl EventBus {
    /// An enabled bus without sinks.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            sinks: Vec::new(),
            enabled: true,
        }
    }

    /// Adds a sink. Sinks see events in registration order.
    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Handle for a run's workers; `None` while the bus is disabled, so a
    /// run without telemetry skips building events altogether.
    pub fn emitter(&self) -> Option<EventEmitter> {
        if self.enabled {
            Some(EventEmitter { tx: self.tx.clone() })
        } else {
            None
        }
    }

    /// Queues an event from the owning thread.
    pub fn emit(&self, event: SimulationEvent) {
        if self.enabled {
            let _ = self.tx.send(event);
        }
    }

    /// Hands every queued event to every sink and returns how many events
    /// were dispatched.
    pub fn flush(&mut self) -> usize {
        let mut dispatched = 0;
        for event in self.rx.try_iter() {
            for sink in self.sinks.iter_mut() {
                sink.handle(&event);
            }
            dispatched += 1;
        }
        dispatched
    }

    /// Flushes, then lets each sink finish its output.
    pub fn shutdown(&mut self) {
        self.flush();
        self.sinks.iter_mut().for_each(|sink| sink.finalize());
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
