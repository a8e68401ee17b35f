//! Data handler — every chunk of a run plus the exchange plan between
//! them.
//!
//! Setup runs once per body: bonds are found on the whole body, the points
//! are decomposed, chunk ids are shifted to run-wide ids, and the chunks
//! are built in parallel. Bodies never share halos, so chunks of
//! different bodies exchange nothing.

use std::ops::Range;

use glam::DVec3;
use rayon::prelude::*;
use peridyn_discretization::{find_bonds, Body, Decomposition, PartitionStrategy};
use peridyn_types::{BodyId, ChunkId, PeridynError, PeridynResult, PointId};

use crate::chunk::BodyChunk;
use crate::halo::ExchangePlan;
use crate::storage::{GlobalField, PointField};
use crate::time_solver::TimeSolver;

/// Setup summary of one body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyInfo {
    /// Body name.
    pub name: String,
    /// Number of points.
    pub n_points: usize,
    /// Number of one-directional bonds.
    pub n_bonds: usize,
    /// Run-wide ids of the body's chunks.
    pub chunks: Range<usize>,
    /// Bonds whose endpoints live in different chunks.
    pub cut_bonds: usize,
    /// Owning chunk of every point.
    owner: Vec<ChunkId>,
}

impl BodyInfo {
    /// Owning chunk of point `pid`.
    pub fn owner_of(&self, pid: PointId) -> Option<ChunkId> {
        self.owner.get(pid.index()).copied()
    }
}

/// All chunks of a run.
#[derive(Debug)]
pub struct DataHandler {
    chunks: Vec<BodyChunk>,
    plan: ExchangePlan,
    bodies: Vec<BodyInfo>,
}

impl DataHandler {
    /// Decomposes one body into `n_chunks` chunks with the fields `solver`
    /// needs.
    pub fn new(body: &Body, n_chunks: usize, strategy: PartitionStrategy, solver: &TimeSolver) -> PeridynResult<Self> {
        Self::multibody(&[(body, n_chunks)], strategy, solver)
    }

    /// Decomposes several bodies, each into its own number of chunks.
    pub fn multibody(bodies: &[(&Body, usize)], strategy: PartitionStrategy, solver: &TimeSolver) -> PeridynResult<Self> {
        Self::build(
            bodies,
            strategy,
            solver.required_point_fields(),
            solver.required_global_fields(),
        )
    }

    /// Decomposes `bodies` and allocates exactly `fields` and `globals`.
    pub fn build(
        bodies: &[(&Body, usize)],
        strategy: PartitionStrategy,
        fields: &[PointField],
        globals: &[GlobalField],
    ) -> PeridynResult<Self> {
        if bodies.is_empty() {
            return Err(PeridynError::InvalidConfig("at least one body is required".into()));
        }
        if bodies.len() > usize::from(u16::MAX) {
            return Err(PeridynError::InvalidConfig(format!("{} bodies exceed the body limit", bodies.len())));
        }
        for (i, (a, _)) in bodies.iter().enumerate() {
            if bodies[..i].iter().any(|(b, _)| b.name == a.name) {
                return Err(PeridynError::InvalidConfig(format!("Body name '{}' is used twice", a.name)));
            }
        }

        let mut chunks = Vec::new();
        let mut infos = Vec::with_capacity(bodies.len());

        for (b, &(body, n_chunks)) in bodies.iter().enumerate() {
            let body_id = BodyId(b as u16);
            let offset = chunks.len();
            let system = find_bonds(body)?;
            let decomposition = Decomposition::new(&system, n_chunks, strategy)?;

            let shift = |c: ChunkId| ChunkId::from(c.index() + offset);
            let mut partitions = decomposition.partitions().to_vec();
            for p in &mut partitions {
                p.id = shift(p.id);
                for owner in &mut p.halo_owner {
                    *owner = shift(*owner);
                }
            }

            let built = partitions
                .par_iter()
                .map(|p| BodyChunk::new(body_id, body, &system, p, fields, globals))
                .collect::<PeridynResult<Vec<_>>>()?;

            let cut_bonds = decomposition.cut_bonds(&system);
            tracing::info!(
                body = %body.name,
                points = body.n_points(),
                bonds = system.n_bonds(),
                chunks = n_chunks,
                cut_bonds,
                halo_points = built.iter().map(|c| c.n_halo()).sum::<usize>(),
                "body decomposed"
            );

            infos.push(BodyInfo {
                name: body.name.clone(),
                n_points: body.n_points(),
                n_bonds: system.n_bonds(),
                chunks: offset..offset + built.len(),
                cut_bonds,
                owner: (0..body.n_points())
                    .map(|i| shift(decomposition.owner_of(PointId::from(i))))
                    .collect(),
            });
            chunks.extend(built);
        }

        let plan = ExchangePlan::new(&chunks)?;
        tracing::debug!(transfers = plan.len(), halo_rows = plan.halo_volume(), "exchange plan built");

        Ok(Self {
            chunks,
            plan,
            bodies: infos,
        })
    }

    /// All chunks, indexed by chunk id.
    pub fn chunks(&self) -> &[BodyChunk] {
        &self.chunks
    }

    /// Mutable access to all chunks.
    pub fn chunks_mut(&mut self) -> &mut [BodyChunk] {
        &mut self.chunks
    }

    /// Chunks and exchange plan, borrowed together for stepping.
    pub fn chunks_and_plan(&mut self) -> (&mut [BodyChunk], &ExchangePlan) {
        (&mut self.chunks, &self.plan)
    }

    /// Chunk `c`.
    pub fn chunk(&self, c: ChunkId) -> Option<&BodyChunk> {
        self.chunks.get(c.index())
    }

    /// Number of chunks.
    pub fn n_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Number of points over all bodies.
    pub fn n_points(&self) -> usize {
        self.chunks.iter().map(|c| c.n_loc()).sum()
    }

    /// Owned points of chunk `c`.
    pub fn n_loc(&self, c: ChunkId) -> Option<usize> {
        self.chunk(c).map(|c| c.n_loc())
    }

    /// Halo points of chunk `c`.
    pub fn n_halo(&self, c: ChunkId) -> Option<usize> {
        self.chunk(c).map(|c| c.n_halo())
    }

    /// Halo exchange plan.
    pub fn plan(&self) -> &ExchangePlan {
        &self.plan
    }

    /// Per-body setup summaries, in input order.
    pub fn bodies(&self) -> &[BodyInfo] {
        &self.bodies
    }

    fn body(&self, name: &str) -> PeridynResult<&BodyInfo> {
        self.bodies
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| PeridynError::InvalidConfig(format!("Unknown body '{name}'")))
    }

    /// Owning chunk and local index of point `pid` of body `body`.
    pub fn locate(&self, body: &str, pid: PointId) -> PeridynResult<(ChunkId, usize)> {
        let info = self.body(body)?;
        let owner = info.owner_of(pid).ok_or_else(|| {
            PeridynError::InvalidConfig(format!("Body '{body}' has no point {}", pid.0))
        })?;
        let local = self.chunks[owner.index()].handler.localize(pid).ok_or_else(|| {
            PeridynError::InvariantViolation(format!("point {} missing from its owner chunk {}", pid.0, owner.0))
        })?;
        Ok((owner, local))
    }

    /// Owned values of a vector field of one body, in global point order.
    pub fn collect_vector(&self, body: &str, field: PointField) -> PeridynResult<Vec<DVec3>> {
        let info = self.body(body)?;
        let mut out = vec![DVec3::ZERO; info.n_points];
        for chunk in &self.chunks[info.chunks.clone()] {
            let values = chunk.storage.vector(field)?;
            for (local, pid) in chunk.handler.loc_point_ids().iter().enumerate() {
                out[pid.index()] = values[local];
            }
        }
        Ok(out)
    }

    /// Point damage of one body, in global point order.
    pub fn collect_damage(&self, body: &str) -> PeridynResult<Vec<f64>> {
        let info = self.body(body)?;
        let mut out = vec![0.0; info.n_points];
        for chunk in &self.chunks[info.chunks.clone()] {
            if !chunk.storage.has(PointField::Damage) {
                return Err(PeridynError::Consistency("damage field is not allocated".into()));
            }
            for (local, pid) in chunk.handler.loc_point_ids().iter().enumerate() {
                out[pid.index()] = chunk.storage.damage[local];
            }
        }
        Ok(out)
    }
}
