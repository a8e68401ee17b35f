//! Per-point kinematic updates shared by the time solvers.
//!
//! All functions touch owned rows only.

use peridyn_types::{PeridynError, PeridynResult};

use crate::chunk::BodyChunk;

/// `u += Δt·v½`, `x += Δt·v½`.
pub fn update_displacement(chunk: &mut BodyChunk, dt: f64) {
    let n_loc = chunk.n_loc();
    let s = &mut chunk.storage;
    for i in 0..n_loc {
        let du = dt * s.velocity_half[i];
        s.displacement[i] += du;
        s.position[i] += du;
    }
}

/// Fails with [`PeridynError::InvariantViolation`] if a force density of
/// an owned point is not finite.
pub fn check_force_density(chunk: &BodyChunk) -> PeridynResult<()> {
    let s = &chunk.storage;
    for i in 0..chunk.n_loc() {
        let b = s.b_int[i] + s.b_ext[i];
        if !b.is_finite() {
            return Err(PeridynError::InvariantViolation(format!(
                "chunk {}: non-finite force density at point {}",
                chunk.id().0,
                chunk.handler.global_id(i).0
            )));
        }
    }
    Ok(())
}
