//! Chunk storage — SoA buffers for every per-point and per-bond field.
//!
//! Only the fields a time solver declares are allocated; the others stay
//! empty vectors. Point fields are sized to the full local + halo count,
//! with owned points first.
//!
//! # Layout
//!
//! ```text
//! position:   [loc_0 .. loc_{n_loc-1} | halo_0 .. halo_{n_halo-1}]
//! bond_active: one flag per bond of the chunk's bond system
//! ```

use std::collections::{BTreeMap, BTreeSet};

use glam::DVec3;
use peridyn_types::{PeridynError, PeridynResult};

/// Per-point fields a solver may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PointField {
    /// Current position `x`.
    Position,
    /// Displacement `u = x − X`.
    Displacement,
    /// Velocity `v`.
    Velocity,
    /// Half-step velocity `v½`.
    VelocityHalf,
    /// Previous half-step velocity (dynamic relaxation).
    VelocityHalfOld,
    /// Acceleration `a`.
    Acceleration,
    /// Internal force density `b_int`.
    BInt,
    /// Internal force density of the previous step (dynamic relaxation).
    BIntOld,
    /// External force density `b_ext`.
    BExt,
    /// Per-axis fictitious mass (dynamic relaxation).
    DensityMatrix,
    /// Fraction of broken bonds.
    Damage,
    /// Number of intact bonds.
    NActiveBonds,
}

impl PointField {
    /// Returns true for three-component fields.
    pub fn is_vector(self) -> bool {
        !matches!(self, PointField::Damage | PointField::NActiveBonds)
    }

    /// Snake-case field name, as used in exports and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            PointField::Position => "position",
            PointField::Displacement => "displacement",
            PointField::Velocity => "velocity",
            PointField::VelocityHalf => "velocity_half",
            PointField::VelocityHalfOld => "velocity_half_old",
            PointField::Acceleration => "acceleration",
            PointField::BInt => "b_int",
            PointField::BIntOld => "b_int_old",
            PointField::BExt => "b_ext",
            PointField::DensityMatrix => "density_matrix",
            PointField::Damage => "damage",
            PointField::NActiveBonds => "n_active_bonds",
        }
    }
}

/// Per-chunk scalar fields a solver may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GlobalField {
    /// Adaptive damping coefficient `cn` of dynamic relaxation.
    DampingCoefficient,
}

/// Field buffers of one chunk.
#[derive(Debug, Clone)]
pub struct ChunkStorage {
    n_loc: usize,
    n_points: usize,
    allocated: BTreeSet<PointField>,
    globals: BTreeMap<GlobalField, f64>,

    // ─── Kinematics ───
    pub position: Vec<DVec3>,
    pub displacement: Vec<DVec3>,
    pub velocity: Vec<DVec3>,
    pub velocity_half: Vec<DVec3>,
    pub velocity_half_old: Vec<DVec3>,
    pub acceleration: Vec<DVec3>,

    // ─── Force densities ───
    pub b_int: Vec<DVec3>,
    pub b_int_old: Vec<DVec3>,
    pub b_ext: Vec<DVec3>,

    // ─── Fictitious mass ───
    pub density_matrix: Vec<DVec3>,

    // ─── Damage ───
    pub damage: Vec<f64>,
    pub n_active_bonds: Vec<usize>,

    /// Bond state. Flags only ever go from `true` to `false`.
    pub bond_active: Vec<bool>,
}

impl ChunkStorage {
    /// Allocates the requested fields, zero-initialized.
    ///
    /// `reference` holds the reference positions of all `n_points`
    /// points and seeds the position field.
    pub fn new(
        n_loc: usize,
        n_bonds: usize,
        fields: &[PointField],
        globals: &[GlobalField],
        reference: &[DVec3],
    ) -> Self {
        let n_points = reference.len();
        let allocated: BTreeSet<PointField> = fields.iter().copied().collect();
        let vector = |field: PointField| {
            if allocated.contains(&field) {
                vec![DVec3::ZERO; n_points]
            } else {
                Vec::new()
            }
        };

        let position = if allocated.contains(&PointField::Position) {
            reference.to_vec()
        } else {
            Vec::new()
        };

        Self {
            n_loc,
            n_points,
            globals: globals.iter().map(|&g| (g, 0.0)).collect(),
            position,
            displacement: vector(PointField::Displacement),
            velocity: vector(PointField::Velocity),
            velocity_half: vector(PointField::VelocityHalf),
            velocity_half_old: vector(PointField::VelocityHalfOld),
            acceleration: vector(PointField::Acceleration),
            b_int: vector(PointField::BInt),
            b_int_old: vector(PointField::BIntOld),
            b_ext: vector(PointField::BExt),
            density_matrix: vector(PointField::DensityMatrix),
            damage: if allocated.contains(&PointField::Damage) {
                vec![0.0; n_points]
            } else {
                Vec::new()
            },
            n_active_bonds: if allocated.contains(&PointField::NActiveBonds) {
                vec![0; n_points]
            } else {
                Vec::new()
            },
            bond_active: vec![true; n_bonds],
            allocated,
        }
    }

    /// Number of owned points.
    #[inline]
    pub fn n_loc(&self) -> usize {
        self.n_loc
    }

    /// Number of owned plus halo points.
    #[inline]
    pub fn n_points(&self) -> usize {
        self.n_points
    }

    /// Returns true if `field` is allocated.
    pub fn has(&self, field: PointField) -> bool {
        self.allocated.contains(&field)
    }

    /// Returns true if `field` is allocated.
    pub fn has_global(&self, field: GlobalField) -> bool {
        self.globals.contains_key(&field)
    }

    /// Allocated point fields in ascending order.
    pub fn fields(&self) -> impl Iterator<Item = PointField> + '_ {
        self.allocated.iter().copied()
    }

    /// Fails with [`PeridynError::Consistency`] unless every field is allocated.
    pub fn ensure(&self, fields: &[PointField], globals: &[GlobalField]) -> PeridynResult<()> {
        if let Some(f) = fields.iter().find(|f| !self.has(**f)) {
            return Err(not_allocated(*f));
        }
        if let Some(g) = globals.iter().find(|g| !self.has_global(**g)) {
            return Err(PeridynError::Consistency(format!(
                "global field {g:?} is not allocated"
            )));
        }
        Ok(())
    }

    /// Read access to a vector field.
    pub fn vector(&self, field: PointField) -> PeridynResult<&[DVec3]> {
        let data: &[DVec3] = match field {
            PointField::Position => &self.position,
            PointField::Displacement => &self.displacement,
            PointField::Velocity => &self.velocity,
            PointField::VelocityHalf => &self.velocity_half,
            PointField::VelocityHalfOld => &self.velocity_half_old,
            PointField::Acceleration => &self.acceleration,
            PointField::BInt => &self.b_int,
            PointField::BIntOld => &self.b_int_old,
            PointField::BExt => &self.b_ext,
            PointField::DensityMatrix => &self.density_matrix,
            PointField::Damage | PointField::NActiveBonds => return Err(not_a_vector(field)),
        };
        if !self.has(field) {
            return Err(not_allocated(field));
        }
        Ok(data)
    }

    /// Write access to a vector field.
    pub fn vector_mut(&mut self, field: PointField) -> PeridynResult<&mut [DVec3]> {
        let allocated = self.has(field);
        let data: &mut [DVec3] = match field {
            PointField::Position => &mut self.position,
            PointField::Displacement => &mut self.displacement,
            PointField::Velocity => &mut self.velocity,
            PointField::VelocityHalf => &mut self.velocity_half,
            PointField::VelocityHalfOld => &mut self.velocity_half_old,
            PointField::Acceleration => &mut self.acceleration,
            PointField::BInt => &mut self.b_int,
            PointField::BIntOld => &mut self.b_int_old,
            PointField::BExt => &mut self.b_ext,
            PointField::DensityMatrix => &mut self.density_matrix,
            PointField::Damage | PointField::NActiveBonds => return Err(not_a_vector(field)),
        };
        if !allocated {
            return Err(not_allocated(field));
        }
        Ok(data)
    }

    /// Zeroes the halo rows of a vector field.
    pub fn zero_halo(&mut self, field: PointField) -> PeridynResult<()> {
        let n_loc = self.n_loc;
        self.vector_mut(field)?[n_loc..].fill(DVec3::ZERO);
        Ok(())
    }

    /// Value of a global field, if allocated.
    pub fn global(&self, field: GlobalField) -> Option<f64> {
        self.globals.get(&field).copied()
    }

    /// Sets an allocated global field.
    pub fn set_global(&mut self, field: GlobalField, value: f64) -> PeridynResult<()> {
        match self.globals.get_mut(&field) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(PeridynError::Consistency(format!(
                "global field {field:?} is not allocated"
            ))),
        }
    }
}

fn not_a_vector(field: PointField) -> PeridynError {
    PeridynError::Consistency(format!("'{}' is not a vector field", field.name()))
}

fn not_allocated(field: PointField) -> PeridynError {
    PeridynError::Consistency(format!("point field '{}' is not allocated", field.name()))
}
