//! Domain decomposition.
//!
//! Splits the global point set into `C` disjoint, balanced partitions and
//! computes, for every partition, the halo: points owned elsewhere that
//! bonds of owned points refer to.
//!
//! ## Strategies
//!
//! - [`PartitionStrategy::GraphGrowing`] grows each partition breadth-first
//!   over the bond graph from the lowest unassigned point. Partitions are
//!   connected where the graph allows it, which keeps halos small.
//! - [`PartitionStrategy::Contiguous`] slices the global index range.
//!
//! Both are deterministic; the assignment is computed once per run.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use peridyn_types::{ChunkId, PeridynError, PeridynResult, PointId};

use crate::bonds::BondSystem;

/// How points are assigned to partitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Breadth-first graph growing over the bond graph.
    #[default]
    GraphGrowing,
    /// Balanced contiguous index slices.
    Contiguous,
}

/// One partition of the global point set.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Partition index.
    pub id: ChunkId,
    /// Owned points, ascending.
    pub owned: Vec<PointId>,
    /// Halo points, ordered by `(owner, global id)`.
    pub halo: Vec<PointId>,
    /// Owner of each halo point (parallel to `halo`).
    pub halo_owner: Vec<ChunkId>,
}

impl Partition {
    /// Number of owned points.
    pub fn n_owned(&self) -> usize {
        self.owned.len()
    }

    /// Number of halo points.
    pub fn n_halo(&self) -> usize {
        self.halo.len()
    }
}

/// Partition assignment and halo sets for one body.
#[derive(Debug, Clone)]
pub struct Decomposition {
    strategy: PartitionStrategy,
    owner: Vec<ChunkId>,
    partitions: Vec<Partition>,
}

impl Decomposition {
    /// Decompose the points of `system` (a whole-body discretization)
    /// into `n_chunks` partitions.
    ///
    /// Fails with [`PeridynError::Decomposition`] if `n_chunks` is zero or
    /// exceeds the number of points.
    pub fn new(system: &BondSystem, n_chunks: usize, strategy: PartitionStrategy) -> PeridynResult<Self> {
        let n = system.n_loc();
        if n_chunks == 0 {
            return Err(PeridynError::Decomposition(
                "Number of chunks must be at least 1".into(),
            ));
        }
        if n_chunks > n {
            return Err(PeridynError::Decomposition(format!(
                "{n_chunks} chunks requested for {n} points"
            )));
        }

        let sizes = balanced_sizes(n, n_chunks);
        let assignment = match strategy {
            PartitionStrategy::GraphGrowing => grow_partitions(system, &sizes),
            PartitionStrategy::Contiguous => slice_partitions(&sizes),
        };

        let mut owner = Vec::with_capacity(n);
        for (i, slot) in assignment.iter().enumerate() {
            match slot {
                Some(p) => owner.push(ChunkId::from(*p)),
                None => {
                    return Err(PeridynError::Decomposition(format!(
                        "Point {i} was not assigned to any partition"
                    )))
                }
            }
        }

        let mut owned: Vec<Vec<PointId>> = vec![Vec::new(); n_chunks];
        for (i, c) in owner.iter().enumerate() {
            owned[c.index()].push(PointId::from(i));
        }

        let partitions = owned
            .into_iter()
            .enumerate()
            .map(|(p, owned)| {
                let id = ChunkId::from(p);
                let mut halo_keys: BTreeSet<(ChunkId, PointId)> = BTreeSet::new();
                for pid in &owned {
                    for bond in system.bonds_of(pid.index()) {
                        let c = owner[bond.neighbor];
                        if c != id {
                            halo_keys.insert((c, PointId::from(bond.neighbor)));
                        }
                    }
                }
                let (halo_owner, halo): (Vec<ChunkId>, Vec<PointId>) =
                    halo_keys.into_iter().unzip();
                Partition {
                    id,
                    owned,
                    halo,
                    halo_owner,
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            chunks = n_chunks,
            ?strategy,
            halo_points = partitions.iter().map(|p| p.n_halo()).sum::<usize>(),
            "domain decomposition built"
        );

        Ok(Self {
            strategy,
            owner,
            partitions,
        })
    }

    /// Strategy used to build this decomposition.
    pub fn strategy(&self) -> PartitionStrategy {
        self.strategy
    }

    /// Number of partitions.
    pub fn n_chunks(&self) -> usize {
        self.partitions.len()
    }

    /// All partitions, indexed by chunk id.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Partition `c`.
    pub fn partition(&self, c: ChunkId) -> &Partition {
        &self.partitions[c.index()]
    }

    /// Owning partition of a point.
    pub fn owner_of(&self, point: PointId) -> ChunkId {
        self.owner[point.index()]
    }

    /// Number of bonds whose endpoints are owned by different partitions.
    pub fn cut_bonds(&self, system: &BondSystem) -> usize {
        (0..system.n_loc())
            .map(|i| {
                system
                    .bonds_of(i)
                    .iter()
                    .filter(|b| self.owner[b.neighbor] != self.owner[i])
                    .count()
            })
            .sum()
    }
}

/// Sizes as even as possible; the first `n mod c` partitions get one more.
fn balanced_sizes(n: usize, c: usize) -> Vec<usize> {
    let base = n / c;
    let rem = n % c;
    (0..c).map(|p| base + usize::from(p < rem)).collect()
}

fn slice_partitions(sizes: &[usize]) -> Vec<Option<usize>> {
    sizes
        .iter()
        .enumerate()
        .flat_map(|(p, &size)| std::iter::repeat(Some(p)).take(size))
        .collect()
}

/// Greedy breadth-first graph growing.
///
/// Each partition starts at the lowest unassigned point and claims
/// unassigned neighbors in bond order until it reaches its target size.
/// When the frontier runs dry (disconnected remainder) it reseeds at the
/// next lowest unassigned point.
fn grow_partitions(system: &BondSystem, sizes: &[usize]) -> Vec<Option<usize>> {
    let n = system.n_loc();
    let mut owner: Vec<Option<usize>> = vec![None; n];
    let mut next_seed = 0;

    for (p, &target) in sizes.iter().enumerate() {
        let mut claimed = 0;
        let mut frontier = VecDeque::new();

        while claimed < target {
            let current = match frontier.pop_front() {
                Some(i) => i,
                None => {
                    while owner[next_seed].is_some() {
                        next_seed += 1;
                    }
                    owner[next_seed] = Some(p);
                    claimed += 1;
                    next_seed
                }
            };

            for bond in system.bonds_of(current) {
                if claimed >= target {
                    break;
                }
                let j = bond.neighbor;
                if owner[j].is_none() {
                    owner[j] = Some(p);
                    claimed += 1;
                    frontier.push_back(j);
                }
            }
        }
    }

    owner
}
