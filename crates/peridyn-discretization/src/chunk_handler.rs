//! Chunk handler — index mapping of one partition.
//!
//! Local indices are dense: owned points occupy `0..n_loc`, halo points
//! `n_loc..n_points`, and the halo range is split into contiguous
//! sub-ranges by owning chunk. Global ids never serve as storage offsets.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use peridyn_types::{ChunkId, PointId};

use crate::decomposition::Partition;

/// Global ↔ local index mapping of one chunk.
#[derive(Debug, Clone)]
pub struct ChunkHandler {
    /// Chunk this handler belongs to.
    pub chunk_id: ChunkId,
    /// Global id of every local index (owned first, then halo).
    pub point_ids: Vec<PointId>,
    /// Local index range of owned points.
    pub loc_points: Range<usize>,
    /// Local index range of halo points.
    pub halo_points: Range<usize>,
    /// Local halo range sourced from each owning chunk.
    pub halo_by_src: BTreeMap<ChunkId, Range<usize>>,
    /// Global id → local index for every referenced point.
    pub localizer: HashMap<PointId, usize>,
}

impl ChunkHandler {
    /// Build the mapping for one partition.
    pub fn new(partition: &Partition) -> Self {
        let n_loc = partition.owned.len();
        let n_points = n_loc + partition.halo.len();

        let mut point_ids = Vec::with_capacity(n_points);
        point_ids.extend_from_slice(&partition.owned);
        point_ids.extend_from_slice(&partition.halo);

        let localizer = point_ids
            .iter()
            .enumerate()
            .map(|(local, &gid)| (gid, local))
            .collect();

        // Halo points are already grouped by owner; record each run.
        let mut halo_by_src: BTreeMap<ChunkId, Range<usize>> = BTreeMap::new();
        for (k, &src) in partition.halo_owner.iter().enumerate() {
            let local = n_loc + k;
            halo_by_src
                .entry(src)
                .and_modify(|r| r.end = local + 1)
                .or_insert(local..local + 1);
        }

        Self {
            chunk_id: partition.id,
            point_ids,
            loc_points: 0..n_loc,
            halo_points: n_loc..n_points,
            halo_by_src,
            localizer,
        }
    }

    /// Number of owned points.
    #[inline]
    pub fn n_loc(&self) -> usize {
        self.loc_points.len()
    }

    /// Number of halo points.
    #[inline]
    pub fn n_halo(&self) -> usize {
        self.halo_points.len()
    }

    /// Number of referenced points (owned + halo).
    #[inline]
    pub fn n_points(&self) -> usize {
        self.point_ids.len()
    }

    /// Global ids of owned points.
    pub fn loc_point_ids(&self) -> &[PointId] {
        &self.point_ids[self.loc_points.clone()]
    }

    /// Global ids of halo points.
    pub fn halo_point_ids(&self) -> &[PointId] {
        &self.point_ids[self.halo_points.clone()]
    }

    /// Local index of a global id, if this chunk references it.
    #[inline]
    pub fn localize(&self, gid: PointId) -> Option<usize> {
        self.localizer.get(&gid).copied()
    }

    /// Global id of a local index.
    #[inline]
    pub fn global_id(&self, local: usize) -> PointId {
        self.point_ids[local]
    }

    /// Returns true if the local index is an owned point.
    #[inline]
    pub fn is_local(&self, local: usize) -> bool {
        local < self.loc_points.end
    }
}
