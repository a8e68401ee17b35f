//! Parameter views used by chunks.
//!
//! A chunk resolves its parameter view once at construction: bodies made
//! of a single material share one [`PointParameters`]; heterogeneous
//! bodies get a table indexed by chunk-local point index.

use crate::properties::PointParameters;

/// Per-point parameter lookup for heterogeneous bodies.
///
/// `index[local]` selects an entry of `parameters`. Lookup is O(1).
#[derive(Debug, Clone, PartialEq)]
pub struct PerPointParameterTable {
    parameters: Vec<PointParameters>,
    index: Vec<u16>,
}

impl PerPointParameterTable {
    /// Builds a table from distinct parameter blocks and a per-point selector.
    ///
    /// Every selector must address an entry of `parameters`; this is
    /// guaranteed by body validation upstream.
    pub fn new(parameters: Vec<PointParameters>, index: Vec<u16>) -> Self {
        debug_assert!(index.iter().all(|&i| (i as usize) < parameters.len()));
        Self { parameters, index }
    }

    /// Number of points covered by the table.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if the table covers no points.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Distinct parameter blocks.
    pub fn parameters(&self) -> &[PointParameters] {
        &self.parameters
    }
}

/// Parameter view of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSet {
    /// One parameter block for every point.
    Uniform(PointParameters),
    /// Per-point lookup table.
    PerPoint(PerPointParameterTable),
}

impl ParameterSet {
    /// Parameters of the point at chunk-local index `local`.
    #[inline]
    pub fn get(&self, local: usize) -> &PointParameters {
        match self {
            ParameterSet::Uniform(params) => params,
            ParameterSet::PerPoint(table) => &table.parameters[table.index[local] as usize],
        }
    }

    /// Returns true if parameters vary per point.
    pub fn is_heterogeneous(&self) -> bool {
        matches!(self, ParameterSet::PerPoint(_))
    }

    /// Largest horizon of any parameter block.
    pub fn max_horizon(&self) -> f64 {
        match self {
            ParameterSet::Uniform(params) => params.horizon,
            ParameterSet::PerPoint(table) => table
                .parameters
                .iter()
                .map(|p| p.horizon)
                .fold(0.0, f64::max),
        }
    }
}
