//! # peridyn-telemetry
//!
//! Structured run events (step boundaries, damping coefficients, bond
//! breakage, export failures) sent from the workers of a run to sinks on
//! the owning thread.

pub mod bus;
pub mod events;
pub mod sinks;

pub use bus::{EventBus, EventEmitter};
pub use events::{EventKind, SimulationEvent};
pub use sinks::{EventSink, TracingSink, VecSink};
