//! Material database with engineering material presets.
//!
//! Presets carry representative elastic and fracture data. Their
//! horizon is a placeholder (`1.0`); jobs set the horizon from the point
//! spacing with [`MaterialSpec::with_horizon`].

use std::collections::BTreeMap;

use crate::properties::{Fracture, MaterialSpec};

/// Material presets keyed by name ("steel", "pmma", ...).
#[derive(Debug, Clone)]
pub struct MaterialDatabase {
    presets: BTreeMap<String, MaterialSpec>,
}

impl MaterialDatabase {
    /// The built-in presets.
    pub fn with_defaults() -> Self {
        [steel(), aluminium(), pmma(), glass()].into_iter().collect()
    }

    pub fn empty() -> Self {
        Self {
            presets: BTreeMap::new(),
        }
    }

    /// Adds `spec` under its own name, replacing a preset of that name.
    pub fn register(&mut self, spec: MaterialSpec) {
        self.presets.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&MaterialSpec> {
        self.presets.get(name)
    }

    /// Preset `name` with its placeholder horizon replaced by `horizon`.
    pub fn preset(&self, name: &str, horizon: f64) -> Option<MaterialSpec> {
        self.get(name).map(|spec| spec.with_horizon(horizon))
    }

    /// Preset names in ascending order.
    pub fn names(&self) -> Vec<&str> {
        self.presets.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl FromIterator<MaterialSpec> for MaterialDatabase {
    fn from_iter<I: IntoIterator<Item = MaterialSpec>>(specs: I) -> Self {
        let mut db = Self::empty();
        for spec in specs {
            db.register(spec);
        }
        db
    }
}

impl Default for MaterialDatabase {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ─── Built-in Presets ─────────────────────────────────────────────────

/// Structural steel.
fn steel() -> MaterialSpec {
    MaterialSpec {
        name: "steel".into(),
        horizon: 1.0,
        density: 7850.0,
        youngs_modulus: 210.0e9,
        fracture: Fracture::EnergyReleaseRate(40_000.0),
    }
}

/// Aluminium alloy (6061-T6).
fn aluminium() -> MaterialSpec {
    MaterialSpec {
        name: "aluminium".into(),
        horizon: 1.0,
        density: 2700.0,
        youngs_modulus: 68.9e9,
        fracture: Fracture::EnergyReleaseRate(20_000.0),
    }
}

/// PMMA, the usual dynamic-fracture benchmark material.
fn pmma() -> MaterialSpec {
    MaterialSpec {
        name: "pmma".into(),
        horizon: 1.0,
        density: 1190.0,
        youngs_modulus: 3.2e9,
        fracture: Fracture::EnergyReleaseRate(300.0),
    }
}

/// Soda-lime glass.
fn glass() -> MaterialSpec {
    MaterialSpec {
        name: "glass".into(),
        horizon: 1.0,
        density: 2440.0,
        youngs_modulus: 72.0e9,
        fracture: Fracture::EnergyReleaseRate(135.0),
    }
}
