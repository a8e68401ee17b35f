//! Body — a point cloud plus everything attached to its points.
//!
//! A body owns positions and volumes (immutable after setup), the material
//! assignment, named point sets used by boundary conditions, fail permits
//! and precracks. It is consumed read-only by bond discretization and
//! chunk construction.

use std::collections::BTreeMap;

use glam::DVec3;
use peridyn_material::{MaterialSpec, PointParameters};
use peridyn_types::{PeridynError, PeridynResult};

use crate::generators::PointCloud;

/// A peridynamic body.
#[derive(Debug, Clone)]
pub struct Body {
    /// Human-readable name, used for point-set diagnostics and export.
    pub name: String,
    /// Reference positions.
    position: Vec<DVec3>,
    /// Point volumes.
    volume: Vec<f64>,
    /// Distinct parameter blocks.
    materials: Vec<PointParameters>,
    /// Per-point index into `materials`; `None` until assigned.
    material_of: Vec<Option<u16>>,
    /// Named point sets (ascending global indices).
    point_sets: BTreeMap<String, Vec<usize>>,
    /// Whether bonds touching a point may break.
    fail_permit: Vec<bool>,
    /// Pairs of point sets between which no bonds are created.
    precracks: Vec<(String, String)>,
}

impl Body {
    /// Creates a body from positions and volumes.
    ///
    /// Fails with [`PeridynError::InvalidBody`] if the cloud is empty, the
    /// arrays disagree in length, a position is non-finite, or a volume is
    /// not strictly positive.
    pub fn new(name: impl Into<String>, position: Vec<DVec3>, volume: Vec<f64>) -> PeridynResult<Self> {
        let name = name.into();
        let n = position.len();

        if n == 0 {
            return Err(PeridynError::InvalidBody(format!("Body '{name}' has no points")));
        }
        if volume.len() != n {
            return Err(PeridynError::InvalidBody(format!(
                "Body '{name}': volume array length ({}) != point count ({n})",
                volume.len()
            )));
        }
        if n > u32::MAX as usize {
            return Err(PeridynError::InvalidBody(format!(
                "Body '{name}' has {n} points, more than a PointId can address"
            )));
        }
        if let Some(i) = position.iter().position(|p| !p.is_finite()) {
            return Err(PeridynError::InvalidBody(format!(
                "Body '{name}': point {i} has a non-finite position"
            )));
        }
        if let Some(i) = volume.iter().position(|&v| !(v.is_finite() && v > 0.0)) {
            return Err(PeridynError::InvalidBody(format!(
                "Body '{name}': point {i} has non-positive volume {}",
                volume[i]
            )));
        }

        Ok(Self {
            name,
            position,
            volume,
            materials: Vec::new(),
            material_of: vec![None; n],
            point_sets: BTreeMap::new(),
            fail_permit: vec![true; n],
            precracks: Vec::new(),
        })
    }

    /// Creates a body from a generated point cloud.
    pub fn from_cloud(name: impl Into<String>, cloud: PointCloud) -> PeridynResult<Self> {
        Self::new(name, cloud.position, cloud.volume)
    }

    /// Returns the number of points.
    #[inline]
    pub fn n_points(&self) -> usize {
        self.position.len()
    }

    /// Reference positions.
    #[inline]
    pub fn position(&self) -> &[DVec3] {
        &self.position
    }

    /// Point volumes.
    #[inline]
    pub fn volume(&self) -> &[f64] {
        &self.volume
    }

    // ─── Materials ───

    /// Assigns one material to every point, replacing earlier assignments.
    pub fn set_material(&mut self, spec: &MaterialSpec) -> PeridynResult<()> {
        let params = PointParameters::new(spec)?;
        self.materials = vec![params];
        self.material_of.fill(Some(0));
        Ok(())
    }

    /// Assigns a material to the points of a named set.
    ///
    /// Identical parameter blocks are shared, so a body whose sets all
    /// receive the same material stays homogeneous.
    pub fn set_material_for(&mut self, set: &str, spec: &MaterialSpec) -> PeridynResult<()> {
        let params = PointParameters::new(spec)?;
        let members = self.require_set(set)?.to_vec();

        let slot = match self.materials.iter().position(|p| *p == params) {
            Some(slot) => slot,
            None => {
                if self.materials.len() > u16::MAX as usize {
                    return Err(PeridynError::InvalidMaterial(format!(
                        "Body '{}' has too many distinct materials",
                        self.name
                    )));
                }
                self.materials.push(params);
                self.materials.len() - 1
            }
        };

        for i in members {
            self.material_of[i] = Some(slot as u16);
        }
        self.compact_materials();
        Ok(())
    }

    /// Drops parameter blocks no point refers to any more.
    fn compact_materials(&mut self) {
        let mut used = vec![false; self.materials.len()];
        for slot in self.material_of.iter().flatten() {
            used[*slot as usize] = true;
        }
        if used.iter().all(|&u| u) {
            return;
        }

        let mut remap = vec![0u16; self.materials.len()];
        let mut kept = Vec::new();
        for (old, params) in self.materials.iter().enumerate() {
            if used[old] {
                remap[old] = kept.len() as u16;
                kept.push(*params);
            }
        }
        for slot in self.material_of.iter_mut().flatten() {
            *slot = remap[*slot as usize];
        }
        self.materials = kept;
    }

    /// Distinct parameter blocks of the body.
    pub fn materials(&self) -> &[PointParameters] {
        &self.materials
    }

    /// Parameter block index of point `i`, if assigned.
    pub fn material_index(&self, i: usize) -> Option<u16> {
        self.material_of[i]
    }

    /// Parameters of point `i`, if assigned.
    pub fn params(&self, i: usize) -> Option<&PointParameters> {
        self.material_of[i].map(|slot| &self.materials[slot as usize])
    }

    /// Returns true if more than one parameter block is in use.
    pub fn is_heterogeneous(&self) -> bool {
        self.materials.len() > 1
    }

    /// Largest horizon of any assigned material (0 if none).
    pub fn max_horizon(&self) -> f64 {
        self.materials.iter().map(|p| p.horizon).fold(0.0, f64::max)
    }

    // ─── Point sets ───

    /// Registers a named point set from explicit indices.
    ///
    /// Indices are sorted and deduplicated. Overwrites an existing set of
    /// the same name.
    pub fn add_point_set(&mut self, name: impl Into<String>, mut indices: Vec<usize>) -> PeridynResult<()> {
        let name = name.into();
        let n = self.n_points();
        if let Some(&bad) = indices.iter().find(|&&i| i >= n) {
            return Err(PeridynError::InvalidBody(format!(
                "Point set '{name}' of body '{}' references point {bad} (point count: {n})",
                self.name
            )));
        }
        indices.sort_unstable();
        indices.dedup();
        self.point_sets.insert(name, indices);
        Ok(())
    }

    /// Registers a named point set of all points whose position satisfies
    /// `predicate`. Returns the number of selected points.
    pub fn point_set_where<F>(&mut self, name: impl Into<String>, predicate: F) -> PeridynResult<usize>
    where
        F: Fn(DVec3) -> bool,
    {
        let indices: Vec<usize> = self
            .position
            .iter()
            .enumerate()
            .filter(|(_, p)| predicate(**p))
            .map(|(i, _)| i)
            .collect();
        let count = indices.len();
        self.add_point_set(name, indices)?;
        Ok(count)
    }

    /// Looks up a named point set.
    pub fn point_set(&self, name: &str) -> Option<&[usize]> {
        self.point_sets.get(name).map(|v| v.as_slice())
    }

    /// All named point sets.
    pub fn point_sets(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.point_sets
    }

    fn require_set(&self, name: &str) -> PeridynResult<&[usize]> {
        self.point_set(name).ok_or_else(|| {
            PeridynError::InvalidBody(format!(
                "Body '{}' has no point set named '{name}'",
                self.name
            ))
        })
    }

    // ─── Failure control ───

    /// Forbids bond failure for every bond touching a point of `set`.
    pub fn no_failure(&mut self, set: &str) -> PeridynResult<()> {
        let members = self.require_set(set)?.to_vec();
        for i in members {
            self.fail_permit[i] = false;
        }
        Ok(())
    }

    /// Returns true if bonds touching point `i` may break.
    #[inline]
    pub fn fail_permit(&self, i: usize) -> bool {
        self.fail_permit[i]
    }

    /// Prevents bonds between the points of `set_a` and `set_b`.
    pub fn precrack(&mut self, set_a: &str, set_b: &str) -> PeridynResult<()> {
        self.require_set(set_a)?;
        self.require_set(set_b)?;
        self.precracks.push((set_a.to_string(), set_b.to_string()));
        Ok(())
    }

    /// Registered precracks.
    pub fn precracks(&self) -> &[(String, String)] {
        &self.precracks
    }

    // ─── Validation ───

    /// Checks the body is ready for discretization.
    ///
    /// Every point needs a material.
    pub fn validate(&self) -> PeridynResult<()> {
        if let Some(i) = self.material_of.iter().position(|m| m.is_none()) {
            return Err(PeridynError::InvalidBody(format!(
                "Body '{}': point {i} has no material",
                self.name
            )));
        }
        Ok(())
    }
}
