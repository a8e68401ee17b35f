//! # peridyn-discretization
//!
//! Everything that turns a point cloud into independently steppable
//! chunks, computed once at setup.
//!
//! ## Key Types
//!
//! - [`Body`] — Point cloud with materials, named point sets, fail permits
//!   and precracks. Immutable after setup.
//! - [`BondSystem`] — Flat bond table with per-point ranges.
//! - [`Decomposition`] — Balanced partition of the points plus halo sets.
//! - [`ChunkHandler`] — Global ↔ local index mapping of one partition.
//! - Procedural generators for uniform point grids.

pub mod body;
pub mod bonds;
pub mod chunk_handler;
pub mod decomposition;
pub mod generators;
pub mod spatial_hash;

pub use body::Body;
pub use bonds::{find_bonds, Bond, BondSystem};
pub use chunk_handler::ChunkHandler;
pub use decomposition::{Decomposition, Partition, PartitionStrategy};
pub use generators::PointCloud;

/// Re-export of the vector type used for positions.
pub use glam::DVec3;
