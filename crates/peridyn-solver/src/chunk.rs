//! Body chunk — the unit of parallel ownership.
//!
//! A chunk holds one partition's owned points plus the halo points its
//! bonds refer to. Everything inside is expressed in dense local indices:
//! owned points occupy `0..n_loc`, halo points `n_loc..n_points`.

use std::collections::BTreeMap;

use peridyn_discretization::{Body, BondSystem, ChunkHandler, Partition};
use peridyn_material::{ParameterSet, PerPointParameterTable, PointParameters};
use peridyn_types::{BodyId, ChunkId, PeridynError, PeridynResult};

use crate::storage::{ChunkStorage, GlobalField, PointField};

/// One partition of a body, ready to be stepped.
#[derive(Debug, Clone)]
pub struct BodyChunk {
    /// Body this chunk belongs to.
    pub body: BodyId,
    /// Name of that body.
    pub body_name: String,
    /// Global ↔ local index mapping.
    pub handler: ChunkHandler,
    /// Bonds of the owned points, in local indices.
    pub system: BondSystem,
    /// Field buffers.
    pub storage: ChunkStorage,
    /// Material parameters, resolved once.
    pub parameters: ParameterSet,
    /// Named point sets restricted to owned points, as local indices.
    pub point_sets: BTreeMap<String, Vec<usize>>,
}

impl BodyChunk {
    /// Builds the chunk of `partition`.
    ///
    /// `global` is the bond discretization of the whole body. The
    /// partition's chunk id must already be the run-wide id.
    pub fn new(
        body_id: BodyId,
        body: &Body,
        global: &BondSystem,
        partition: &Partition,
        fields: &[PointField],
        globals: &[GlobalField],
    ) -> PeridynResult<Self> {
        let handler = ChunkHandler::new(partition);
        let system = BondSystem::localize(global, &handler)?;
        let parameters = resolve_parameters(body, &handler)?;

        let mut storage = ChunkStorage::new(
            handler.n_loc(),
            system.n_bonds(),
            fields,
            globals,
            &system.position,
        );
        if storage.has(PointField::NActiveBonds) {
            storage.n_active_bonds[..handler.n_loc()].copy_from_slice(&system.n_neighbors);
        }

        let point_sets = body
            .point_sets()
            .iter()
            .map(|(name, members)| {
                let local: Vec<usize> = members
                    .iter()
                    .filter_map(|&i| handler.localize(i.into()))
                    .filter(|&l| handler.is_local(l))
                    .collect();
                (name.clone(), local)
            })
            .collect();

        Ok(Self {
            body: body_id,
            body_name: body.name.clone(),
            handler,
            system,
            storage,
            parameters,
            point_sets,
        })
    }

    /// Run-wide chunk id.
    #[inline]
    pub fn id(&self) -> ChunkId {
        self.handler.chunk_id
    }

    /// Number of owned points.
    #[inline]
    pub fn n_loc(&self) -> usize {
        self.handler.n_loc()
    }

    /// Number of halo points.
    #[inline]
    pub fn n_halo(&self) -> usize {
        self.handler.n_halo()
    }

    /// Number of owned plus halo points.
    #[inline]
    pub fn n_points(&self) -> usize {
        self.handler.n_points()
    }

    /// Parameters of the point at local index `local`.
    #[inline]
    pub fn params(&self, local: usize) -> &PointParameters {
        self.parameters.get(local)
    }

    /// Owned members of a named point set, as local indices.
    pub fn point_set(&self, name: &str) -> Option<&[usize]> {
        self.point_sets.get(name).map(|v| v.as_slice())
    }
}

impl AsRef<BodyChunk> for BodyChunk {
    fn as_ref(&self) -> &BodyChunk {
        self
    }
}

impl AsMut<BodyChunk> for BodyChunk {
    fn as_mut(&mut self) -> &mut BodyChunk {
        self
    }
}

fn resolve_parameters(body: &Body, handler: &ChunkHandler) -> PeridynResult<ParameterSet> {
    let missing = |gid: u32| {
        PeridynError::InvalidBody(format!(
            "Body '{}': point {gid} has no material",
            body.name
        ))
    };

    if !body.is_heterogeneous() {
        let params = body.materials().first().copied().ok_or_else(|| missing(0))?;
        return Ok(ParameterSet::Uniform(params));
    }

    let index = handler
        .point_ids
        .iter()
        .map(|id| body.material_index(id.index()).ok_or_else(|| missing(id.0)))
        .collect::<PeridynResult<Vec<u16>>>()?;
    Ok(ParameterSet::PerPoint(PerPointParameterTable::new(
        body.materials().to_vec(),
        index,
    )))
}
