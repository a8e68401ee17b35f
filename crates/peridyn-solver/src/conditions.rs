//! Boundary and initial conditions.
//!
//! Conditions act on named point sets of a body. A chunk only sees the
//! owned members of each set, so applying conditions is purely local.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chunk::BodyChunk;

/// Mutates boundary-affected fields of a chunk.
pub trait Conditions: Send + Sync {
    /// Applies conditions for time `t`. Called at the start of every step.
    fn apply(&self, chunk: &mut BodyChunk, t: f64);

    /// Applies initial conditions. Called once before the first step.
    fn apply_initial(&self, _chunk: &mut BodyChunk) {}
}

/// No conditions at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConditions;

impl Conditions for NoConditions {
    fn apply(&self, _chunk: &mut BodyChunk, _t: f64) {}
}

/// Cartesian axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Component index.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Time dependence of a prescribed value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionValue {
    /// Same value at every time.
    Constant(f64),
    /// `rate · t`.
    Ramp { rate: f64 },
}

impl ConditionValue {
    /// Value at time `t`.
    #[inline]
    pub fn at(self, t: f64) -> f64 {
        match self {
            ConditionValue::Constant(v) => v,
            ConditionValue::Ramp { rate } => rate * t,
        }
    }
}

/// One prescribed component on a point set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCondition {
    /// Body the set belongs to; `None` matches every body with such a set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Point set name.
    pub set: String,
    /// Prescribed component.
    pub axis: Axis,
    /// Prescribed value.
    pub value: ConditionValue,
}

impl PointCondition {
    /// Creates a condition on `set` of any body.
    pub fn new(set: impl Into<String>, axis: Axis, value: ConditionValue) -> Self {
        Self {
            body: None,
            set: set.into(),
            axis,
            value,
        }
    }

    /// Restricts the condition to one body.
    pub fn on_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    fn targets<'c>(&self, body: &str, sets: &'c BTreeMap<String, Vec<usize>>) -> &'c [usize] {
        if self.body.as_deref().is_some_and(|b| b != body) {
            return &[];
        }
        sets.get(&self.set).map_or(&[], |v| v.as_slice())
    }
}

/// Velocity, force density and initial velocity conditions.
///
/// - Velocity conditions prescribe one component of `velocity_half`.
/// - Force density conditions prescribe one component of `b_ext`.
/// - Initial velocity conditions prescribe `velocity` and `velocity_half`
///   once, before the first step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConditions {
    #[serde(default)]
    pub velocity: Vec<PointCondition>,
    #[serde(default)]
    pub force_density: Vec<PointCondition>,
    #[serde(default)]
    pub initial_velocity: Vec<PointCondition>,
}

impl BoundaryConditions {
    /// Creates an empty condition set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a velocity condition.
    pub fn velocity(mut self, condition: PointCondition) -> Self {
        self.velocity.push(condition);
        self
    }

    /// Adds a force density condition.
    pub fn force_density(mut self, condition: PointCondition) -> Self {
        self.force_density.push(condition);
        self
    }

    /// Adds an initial velocity condition.
    pub fn initial_velocity(mut self, condition: PointCondition) -> Self {
        self.initial_velocity.push(condition);
        self
    }

    /// Total number of conditions.
    pub fn len(&self) -> usize {
        self.velocity.len() + self.force_density.len() + self.initial_velocity.len()
    }

    /// Returns true if no condition is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of every point set referenced, with the body filter.
    pub fn referenced_sets(&self) -> impl Iterator<Item = (Option<&str>, &str)> + '_ {
        self.velocity
            .iter()
            .chain(&self.force_density)
            .chain(&self.initial_velocity)
            .map(|c| (c.body.as_deref(), c.set.as_str()))
    }
}

impl Conditions for BoundaryConditions {
    fn apply(&self, chunk: &mut BodyChunk, t: f64) {
        let BodyChunk {
            body_name,
            point_sets,
            storage,
            ..
        } = chunk;

        for c in &self.velocity {
            let (axis, value) = (c.axis.index(), c.value.at(t));
            for &i in c.targets(body_name, point_sets) {
                storage.velocity_half[i][axis] = value;
            }
        }
        for c in &self.force_density {
            let (axis, value) = (c.axis.index(), c.value.at(t));
            for &i in c.targets(body_name, point_sets) {
                storage.b_ext[i][axis] = value;
            }
        }
    }

    fn apply_initial(&self, chunk: &mut BodyChunk) {
        let BodyChunk {
            body_name,
            point_sets,
            storage,
            ..
        } = chunk;

        for c in &self.initial_velocity {
            let (axis, value) = (c.axis.index(), c.value.at(0.0));
            for &i in c.targets(body_name, point_sets) {
                storage.velocity[i][axis] = value;
                storage.velocity_half[i][axis] = value;
            }
        }
    }
}
