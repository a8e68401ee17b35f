//! # peridyn-types
//!
//! Error taxonomy, typed ids and numerical defaults used by every
//! peridyn crate. No simulation logic lives here.

pub mod constants;
pub mod error;
pub mod ids;

pub use error::{PeridynError, PeridynResult};
pub use ids::{BodyId, ChunkId, PointId};
