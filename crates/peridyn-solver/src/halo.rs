//! Halo exchange between chunks.
//!
//! The [`ExchangePlan`] is computed once per run. Each [`HaloTransfer`]
//! links a run of halo rows in a destination chunk to the owned rows of
//! the source chunk that owns those points.
//!
//! Two directions:
//!
//! - **loc → halo**: owners publish current values; halo copies are
//!   overwritten before force computation reads them.
//! - **halo → loc**: contributions written into halo rows are added to the
//!   owners' rows, then the halo rows are zeroed.
//!
//! Shared-memory exchange runs as two rayon phases (gather into staging
//! buffers, then scatter). The end of each parallel phase is the barrier:
//! no chunk is written while another one is still being read.

use std::ops::Range;

use glam::DVec3;
use rayon::prelude::*;
use peridyn_types::{ChunkId, PeridynError, PeridynResult};

use crate::chunk::BodyChunk;
use crate::storage::PointField;

/// One directed block of halo rows.
#[derive(Debug, Clone, PartialEq)]
pub struct HaloTransfer {
    /// Chunk owning the points.
    pub src: ChunkId,
    /// Chunk holding them as halo points.
    pub dest: ChunkId,
    /// Local indices of the points in `src` (owned rows).
    pub src_local: Vec<usize>,
    /// Local halo rows of the points in `dest`.
    pub dest_local: Range<usize>,
}

impl HaloTransfer {
    /// Number of points moved by this transfer.
    pub fn len(&self) -> usize {
        self.src_local.len()
    }

    /// Returns true if the transfer moves no points.
    pub fn is_empty(&self) -> bool {
        self.src_local.is_empty()
    }

    /// Reads the owned values from the source chunk.
    pub fn gather_owned(&self, src: &BodyChunk, field: PointField) -> PeridynResult<Vec<DVec3>> {
        let data = src.storage.vector(field)?;
        Ok(self.src_local.iter().map(|&i| data[i]).collect())
    }

    /// Overwrites the halo rows of the destination chunk.
    pub fn scatter_halo(&self, dest: &mut BodyChunk, field: PointField, values: &[DVec3]) -> PeridynResult<()> {
        self.check_len(values)?;
        dest.storage.vector_mut(field)?[self.dest_local.clone()].copy_from_slice(values);
        Ok(())
    }

    /// Reads the halo rows of the destination chunk.
    pub fn gather_halo(&self, dest: &BodyChunk, field: PointField) -> PeridynResult<Vec<DVec3>> {
        Ok(dest.storage.vector(field)?[self.dest_local.clone()].to_vec())
    }

    /// Adds halo contributions into the owned rows of the source chunk.
    pub fn accumulate_owned(&self, src: &mut BodyChunk, field: PointField, values: &[DVec3]) -> PeridynResult<()> {
        self.check_len(values)?;
        let data = src.storage.vector_mut(field)?;
        for (&i, v) in self.src_local.iter().zip(values) {
            data[i] += *v;
        }
        Ok(())
    }

    fn check_len(&self, values: &[DVec3]) -> PeridynResult<()> {
        if values.len() != self.len() {
            return Err(PeridynError::Consistency(format!(
                "halo transfer {} → {} carries {} values, expected {}",
                self.src.0,
                self.dest.0,
                values.len(),
                self.len()
            )));
        }
        Ok(())
    }
}

/// All halo transfers of a run, indexed by destination and by source.
#[derive(Debug, Clone, Default)]
pub struct ExchangePlan {
    transfers: Vec<HaloTransfer>,
    /// Per destination chunk: transfer indices ordered by source chunk.
    incoming: Vec<Vec<usize>>,
    /// Per source chunk: transfer indices ordered by destination chunk.
    outgoing: Vec<Vec<usize>>,
}

impl ExchangePlan {
    /// Derives the plan from the chunks' `halo_by_src` ranges.
    ///
    /// `chunks[c]` must be the chunk with id `c`.
    pub fn new(chunks: &[BodyChunk]) -> PeridynResult<Self> {
        let n = chunks.len();
        let mut transfers = Vec::new();
        let mut incoming = vec![Vec::new(); n];
        let mut outgoing = vec![Vec::new(); n];

        for (d, dest) in chunks.iter().enumerate() {
            if dest.id().index() != d {
                return Err(PeridynError::Decomposition(format!(
                    "chunk at position {d} has id {}",
                    dest.id().0
                )));
            }
            for (&src_id, range) in &dest.handler.halo_by_src {
                let src = chunks.get(src_id.index()).ok_or_else(|| {
                    PeridynError::Decomposition(format!(
                        "chunk {d} expects halo data from unknown chunk {}",
                        src_id.0
                    ))
                })?;

                let src_local = range
                    .clone()
                    .map(|k| {
                        let gid = dest.handler.global_id(k);
                        src.handler
                            .localize(gid)
                            .filter(|&l| src.handler.is_local(l))
                            .ok_or_else(|| {
                                PeridynError::Decomposition(format!(
                                    "halo point {} of chunk {d} is not owned by chunk {}",
                                    gid.0, src_id.0
                                ))
                            })
                    })
                    .collect::<PeridynResult<Vec<usize>>>()?;

                let t = transfers.len();
                transfers.push(HaloTransfer {
                    src: src_id,
                    dest: dest.id(),
                    src_local,
                    dest_local: range.clone(),
                });
                incoming[d].push(t);
                outgoing[src_id.index()].push(t);
            }
        }

        Ok(Self {
            transfers,
            incoming,
            outgoing,
        })
    }

    /// All transfers.
    pub fn transfers(&self) -> &[HaloTransfer] {
        &self.transfers
    }

    /// Transfer `t`.
    #[inline]
    pub fn transfer(&self, t: usize) -> &HaloTransfer {
        &self.transfers[t]
    }

    /// Transfers delivering halo rows to `dest`, ordered by source chunk.
    pub fn incoming(&self, dest: ChunkId) -> &[usize] {
        self.incoming.get(dest.index()).map_or(&[], |v| v.as_slice())
    }

    /// Transfers reading owned rows of `src`, ordered by destination chunk.
    pub fn outgoing(&self, src: ChunkId) -> &[usize] {
        self.outgoing.get(src.index()).map_or(&[], |v| v.as_slice())
    }

    /// Number of transfers.
    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    /// Returns true if no chunk has halo points.
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Total number of halo rows refreshed per exchange.
    pub fn halo_volume(&self) -> usize {
        self.transfers.iter().map(HaloTransfer::len).sum()
    }
}

/// Refreshes every halo copy of `field` from its owner.
///
/// `chunks[c]` must be the chunk with id `c`.
pub fn exchange_loc_to_halo<C>(chunks: &mut [C], plan: &ExchangePlan, field: PointField) -> PeridynResult<()>
where
    C: AsRef<BodyChunk> + AsMut<BodyChunk> + Send + Sync,
{
    let staged: Vec<Vec<DVec3>> = {
        let chunks: &[C] = chunks;
        plan.transfers
            .par_iter()
            .map(|t| t.gather_owned(chunks[t.src.index()].as_ref(), field))
            .collect::<PeridynResult<_>>()?
    };

    chunks.par_iter_mut().try_for_each(|chunk| {
        let chunk = chunk.as_mut();
        for &t in plan.incoming(chunk.id()) {
            plan.transfers[t].scatter_halo(chunk, field, &staged[t])?;
        }
        Ok(())
    })
}

/// Adds halo contributions of `field` into their owners and zeroes the
/// halo rows.
///
/// Contributions are added in ascending order of the contributing chunk,
/// so the result does not depend on scheduling.
pub fn exchange_halo_to_loc<C>(chunks: &mut [C], plan: &ExchangePlan, field: PointField) -> PeridynResult<()>
where
    C: AsRef<BodyChunk> + AsMut<BodyChunk> + Send + Sync,
{
    let staged: Vec<Vec<DVec3>> = {
        let chunks: &[C] = chunks;
        plan.transfers
            .par_iter()
            .map(|t| t.gather_halo(chunks[t.dest.index()].as_ref(), field))
            .collect::<PeridynResult<_>>()?
    };

    chunks.par_iter_mut().try_for_each(|chunk| {
        let chunk = chunk.as_mut();
        chunk.storage.zero_halo(field)?;
        for &t in plan.outgoing(chunk.id()) {
            plan.transfers[t].accumulate_owned(chunk, field, &staged[t])?;
        }
        Ok(())
    })
}
