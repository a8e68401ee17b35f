//! Worker — one execution context's view of the chunks it owns.
//!
//! A pooled worker owns every chunk and runs each phase as a rayon
//! parallel loop. A rank worker owns the chunks `c` with
//! `c mod n_ranks == rank`, steps them sequentially on its own thread,
//! and exchanges halo data with the other ranks only through messages.
//!
//! Messages are matched by `(exchange tag, source chunk, destination
//! chunk)`. Every rank performs the same sequence of exchanges, so tags
//! are a plain per-rank counter. Messages that arrive early are parked
//! until they are asked for.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use glam::DVec3;
use rayon::prelude::*;
use peridyn_telemetry::{EventEmitter, EventKind, SimulationEvent};
use peridyn_types::{ChunkId, PeridynError, PeridynResult};

use crate::chunk::BodyChunk;
use crate::halo::{exchange_halo_to_loc, exchange_loc_to_halo, ExchangePlan};
use crate::run::RunContext;
use crate::storage::PointField;

/// Halo rows in flight between two ranks.
#[derive(Debug)]
pub(crate) struct HaloMessage {
    tag: u64,
    src: ChunkId,
    dest: ChunkId,
    data: Vec<DVec3>,
}

#[derive(Debug)]
pub(crate) enum Message {
    Halo(HaloMessage),
    Abort { rank: usize, reason: String },
}

type MessageKey = (u64, ChunkId, ChunkId);

/// Channel endpoints of one rank.
pub(crate) struct RankLink {
    rank: usize,
    inbox: Receiver<Message>,
    peers: Vec<Sender<Message>>,
    parked: HashMap<MessageKey, Vec<DVec3>>,
    next_tag: u64,
}

impl RankLink {
    /// Fully connected links for `n_ranks` ranks.
    pub(crate) fn mesh(n_ranks: usize) -> Vec<RankLink> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..n_ranks).map(|_| mpsc::channel()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| RankLink {
                rank,
                inbox,
                peers: senders.clone(),
                parked: HashMap::new(),
                next_tag: 0,
            })
            .collect()
    }

    /// Handle that tells every other rank to stop if this rank fails.
    pub(crate) fn abort_signal(&self) -> AbortSignal {
        AbortSignal {
            rank: self.rank,
            peers: self.peers.clone(),
            reason: None,
            armed: true,
        }
    }

    #[inline]
    fn rank_of(&self, chunk: ChunkId) -> usize {
        chunk.index() % self.peers.len()
    }

    fn next_tag(&mut self) -> u64 {
        let tag = self.next_tag;
        self.next_tag += 1;
        tag
    }

    fn send(&self, to: ChunkId, message: HaloMessage) -> PeridynResult<()> {
        let rank = self.rank_of(to);
        self.peers[rank].send(Message::Halo(message)).map_err(|_| PeridynError::WorkerFailure {
            rank,
            reason: "rank stopped receiving".into(),
        })
    }

    /// Blocks until the message keyed `(tag, src, dest)` is available.
    fn recv(&mut self, tag: u64, src: ChunkId, dest: ChunkId) -> PeridynResult<Vec<DVec3>> {
        if let Some(data) = self.parked.remove(&(tag, src, dest)) {
            return Ok(data);
        }
        loop {
            match self.inbox.recv() {
                Ok(Message::Halo(m)) if (m.tag, m.src, m.dest) == (tag, src, dest) => return Ok(m.data),
                Ok(Message::Halo(m)) => {
                    self.parked.insert((m.tag, m.src, m.dest), m.data);
                }
                Ok(Message::Abort { rank, reason }) => {
                    return Err(PeridynError::WorkerFailure { rank, reason });
                }
                Err(_) => {
                    return Err(PeridynError::WorkerFailure {
                        rank: self.rank,
                        reason: "every peer disconnected".into(),
                    })
                }
            }
        }
    }

    /// Drains the inbox without blocking; fails if a peer aborted.
    fn poll(&mut self) -> PeridynResult<()> {
        loop {
            match self.inbox.try_recv() {
                Ok(Message::Halo(m)) => {
                    self.parked.insert((m.tag, m.src, m.dest), m.data);
                }
                Ok(Message::Abort { rank, reason }) => {
                    return Err(PeridynError::WorkerFailure { rank, reason });
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
    }
}

/// Broadcasts an abort to every other rank when dropped while armed.
///
/// Dropping happens on error returns and on panics alike, so siblings
/// blocked in a receive are always released.
pub(crate) struct AbortSignal {
    rank: usize,
    peers: Vec<Sender<Message>>,
    reason: Option<String>,
    armed: bool,
}

impl AbortSignal {
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }

    pub(crate) fn set_reason(&mut self, reason: String) {
        self.reason = Some(reason);
    }
}

impl Drop for AbortSignal {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let reason = self.reason.take().unwrap_or_else(|| "worker panicked".into());
        for (rank, peer) in self.peers.iter().enumerate() {
            if rank != self.rank {
                let _ = peer.send(Message::Abort {
                    rank: self.rank,
                    reason: reason.clone(),
                });
            }
        }
    }
}

/// The chunks one execution context owns, plus its communication.
pub struct Worker<'a> {
    ctx: RunContext,
    chunks: Vec<&'a mut BodyChunk>,
    plan: &'a ExchangePlan,
    link: Option<RankLink>,
    events: Option<EventEmitter>,
}

impl<'a> Worker<'a> {
    /// A worker owning every chunk, stepping them with rayon.
    pub(crate) fn pooled(chunks: &'a mut [BodyChunk], plan: &'a ExchangePlan, events: Option<EventEmitter>) -> Self {
        Self {
            ctx: RunContext::single(),
            chunks: chunks.iter_mut().collect(),
            plan,
            link: None,
            events,
        }
    }

    /// A worker for one rank.
    pub(crate) fn rank(
        ctx: RunContext,
        chunks: Vec<&'a mut BodyChunk>,
        plan: &'a ExchangePlan,
        link: RankLink,
        events: Option<EventEmitter>,
    ) -> Self {
        Self {
            ctx,
            chunks,
            plan,
            link: Some(link),
            events,
        }
    }

    /// Execution context of this worker.
    pub fn context(&self) -> RunContext {
        self.ctx
    }

    /// Number of chunks owned by this worker.
    pub fn n_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Ids of the owned chunks, in stepping order.
    pub fn chunk_ids(&self) -> Vec<ChunkId> {
        self.chunks.iter().map(|c| c.id()).collect()
    }

    /// Owned chunks, in stepping order.
    pub fn chunks(&self) -> impl Iterator<Item = &BodyChunk> + '_ {
        self.chunks.iter().map(|c| &**c)
    }

    /// Runs `f` on every owned chunk and collects the results in chunk
    /// order.
    ///
    /// Returning marks the end of a phase: every chunk has finished.
    pub fn map_chunks<R, F>(&mut self, f: F) -> PeridynResult<Vec<R>>
    where
        R: Send,
        F: Fn(&mut BodyChunk) -> PeridynResult<R> + Sync + Send,
    {
        if self.link.is_some() {
            self.chunks.iter_mut().map(|c| f(&mut **c)).collect()
        } else {
            self.chunks.par_iter_mut().map(|c| f(&mut **c)).collect()
        }
    }

    /// Refreshes halo copies of `field` from their owners.
    pub fn loc_to_halo(&mut self, field: PointField) -> PeridynResult<()> {
        let plan = self.plan;
        let Worker { chunks, link, .. } = self;
        let Some(link) = link else {
            return exchange_loc_to_halo(chunks.as_mut_slice(), plan, field);
        };

        let tag = link.next_tag();
        for chunk in chunks.iter() {
            for &t in plan.outgoing(chunk.id()) {
                let tr = plan.transfer(t);
                let data = tr.gather_owned(chunk, field)?;
                link.send(
                    tr.dest,
                    HaloMessage {
                        tag,
                        src: tr.src,
                        dest: tr.dest,
                        data,
                    },
                )?;
            }
        }
        for chunk in chunks.iter_mut() {
            for &t in plan.incoming(chunk.id()) {
                let tr = plan.transfer(t);
                let data = link.recv(tag, tr.src, tr.dest)?;
                tr.scatter_halo(chunk, field, &data)?;
            }
        }
        Ok(())
    }

    /// Adds halo contributions of `field` into their owners.
    pub fn halo_to_loc(&mut self, field: PointField) -> PeridynResult<()> {
        let plan = self.plan;
        let Worker { chunks, link, .. } = self;
        let Some(link) = link else {
            return exchange_halo_to_loc(chunks.as_mut_slice(), plan, field);
        };

        let tag = link.next_tag();
        for chunk in chunks.iter_mut() {
            for &t in plan.incoming(chunk.id()) {
                let tr = plan.transfer(t);
                let data = tr.gather_halo(chunk, field)?;
                link.send(
                    tr.src,
                    HaloMessage {
                        tag,
                        src: tr.src,
                        dest: tr.dest,
                        data,
                    },
                )?;
            }
            chunk.storage.zero_halo(field)?;
        }
        for chunk in chunks.iter_mut() {
            for &t in plan.outgoing(chunk.id()) {
                let tr = plan.transfer(t);
                let data = link.recv(tag, tr.src, tr.dest)?;
                tr.accumulate_owned(chunk, field, &data)?;
            }
        }
        Ok(())
    }

    /// Fails if another rank has aborted the run.
    pub(crate) fn poll_abort(&mut self) -> PeridynResult<()> {
        match self.link.as_mut() {
            Some(link) => link.poll(),
            None => Ok(()),
        }
    }

    /// Emits a telemetry event if the run has an event bus.
    pub fn emit(&self, timestep: u32, kind: EventKind) {
        if let Some(events) = &self.events {
            events.emit(SimulationEvent::new(timestep, kind));
        }
    }
}
