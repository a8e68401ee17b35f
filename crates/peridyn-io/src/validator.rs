//! Job validation.
//!
//! Validates a job before any body is built, catching configuration
//! errors early with clear diagnostics. Geometry and material values are
//! checked again when the bodies are generated.

use std::collections::BTreeSet;

use peridyn_material::MaterialDatabase;
use peridyn_solver::TimeSolver;
use peridyn_types::{PeridynError, PeridynResult};

use crate::job::{BodyConfig, Geometry, JobConfig, MaterialConfig};

/// Validates a complete job.
///
/// Checks:
/// - At least one body, with unique names and positive chunk counts
/// - Geometry sizes and explicit point arrays
/// - Material presets exist; a horizon is known for every material
/// - Every referenced point set is defined on its body
/// - Solver parameters and the execution mode
pub fn validate_job(job: &JobConfig) -> PeridynResult<()> {
    if job.bodies.is_empty() {
        return Err(invalid("a job needs at least one body".into()));
    }

    let materials = MaterialDatabase::with_defaults();
    let mut names = BTreeSet::new();
    for (b, body) in job.bodies.iter().enumerate() {
        if !names.insert(body.name.as_str()) {
            return Err(invalid(format!("body name '{}' is used twice", body.name)));
        }
        if job.chunks_of(b) == 0 {
            return Err(invalid(format!("body '{}': chunk count must be positive", body.name)));
        }
        validate_body(body, &materials)?;
    }

    validate_conditions(job)?;
    TimeSolver::from_config(&job.solver)?;
    job.run.execution.validate(job.total_chunks())?;
    Ok(())
}

fn invalid(message: String) -> PeridynError {
    PeridynError::InvalidConfig(message)
}

fn validate_body(body: &BodyConfig, materials: &MaterialDatabase) -> PeridynResult<()> {
    let name = &body.name;
    match &body.geometry {
        Geometry::Box { size, spacing, .. } => {
            if size.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
                return Err(invalid(format!("body '{name}': box size must be positive, got {size:?}")));
            }
            check_spacing(name, *spacing)?;
        }
        Geometry::Cylinder {
            radius,
            height,
            spacing,
            ..
        } => {
            if !(radius.is_finite() && *radius > 0.0 && height.is_finite() && *height > 0.0) {
                return Err(invalid(format!("body '{name}': cylinder radius and height must be positive")));
            }
            check_spacing(name, *spacing)?;
        }
        Geometry::Points { position, volume } => {
            if position.is_empty() {
                return Err(invalid(format!("body '{name}' has no points")));
            }
            if position.len() != volume.len() {
                return Err(invalid(format!(
                    "body '{name}': {} positions but {} volumes",
                    position.len(),
                    volume.len()
                )));
            }
        }
    }

    let spacing = body.geometry.spacing();
    validate_material(name, &body.material, spacing, materials)?;

    let mut sets = BTreeSet::new();
    for region in &body.point_sets {
        if !sets.insert(region.name.as_str()) {
            return Err(invalid(format!("body '{name}': point set '{}' is defined twice", region.name)));
        }
        if (0..3).any(|d| region.lower[d] > region.upper[d]) {
            return Err(invalid(format!(
                "body '{name}': point set '{}' has lower bound above upper bound",
                region.name
            )));
        }
    }

    let require = |set: &str, what: &str| {
        if sets.contains(set) {
            Ok(())
        } else {
            Err(invalid(format!("body '{name}': {what} refers to undefined point set '{set}'")))
        }
    };
    for entry in &body.set_materials {
        require(&entry.set, "set material")?;
        validate_material(name, &entry.material, spacing, materials)?;
    }
    for set in &body.no_failure {
        require(set, "no_failure")?;
    }
    for crack in &body.precracks {
        require(&crack.a, "precrack")?;
        require(&crack.b, "precrack")?;
    }
    Ok(())
}

fn check_spacing(body: &str, spacing: f64) -> PeridynResult<()> {
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(invalid(format!("body '{body}': spacing must be positive, got {spacing}")));
    }
    Ok(())
}

fn validate_material(
    body: &str,
    material: &MaterialConfig,
    spacing: Option<f64>,
    materials: &MaterialDatabase,
) -> PeridynResult<()> {
    match material {
        MaterialConfig::Preset { preset, horizon } => {
            if materials.get(preset).is_none() {
                return Err(invalid(format!(
                    "body '{body}': unknown material '{preset}'. Available: {}",
                    materials.names().join(", ")
                )));
            }
            if horizon.is_none() && spacing.is_none() {
                return Err(invalid(format!(
                    "body '{body}': material '{preset}' needs a horizon for explicit points"
                )));
            }
            Ok(())
        }
        MaterialConfig::Inline(_) => Ok(()),
    }
}

fn validate_conditions(job: &JobConfig) -> PeridynResult<()> {
    for (body, set) in job.conditions.referenced_sets() {
        let defined = job
            .bodies
            .iter()
            .filter(|b| body.map_or(true, |name| b.name == name))
            .any(|b| b.point_sets.iter().any(|r| r.name == set));
        if !defined {
            return Err(invalid(match body {
                Some(body) => format!("condition refers to undefined point set '{set}' of body '{body}'"),
                None => format!("condition refers to undefined point set '{set}'"),
            }));
        }
    }
    Ok(())
}
