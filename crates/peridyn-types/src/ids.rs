//! Strongly-typed identifiers for simulation entities.
//!
//! Newtype wrappers prevent accidental mixing of global point ids
//! with chunk ids or body ids. Chunk-local indices are plain `usize`
//! offsets into chunk storage and never share a type with [`PointId`].

use serde::{Deserialize, Serialize};

/// Global index of a point within its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PointId(pub u32);

/// Index of a chunk (partition) within a data handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId(pub u32);

/// Index of a body within a multibody job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyId(pub u16);

impl PointId {
    /// Returns the raw index as `usize` for array indexing.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ChunkId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BodyId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for PointId {
    fn from(val: usize) -> Self {
        Self(val as u32)
    }
}

impl From<usize> for ChunkId {
    fn from(val: usize) -> Self {
        Self(val as u32)
    }
}

impl From<u16> for BodyId {
    fn from(val: u16) -> Self {
        Self(val)
    }
}
