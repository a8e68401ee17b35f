//! Numerical constants and simulation defaults.

/// Default safety factor applied to the stable Velocity Verlet time step.
pub const DEFAULT_SAFETY_FACTOR: f64 = 0.7;

/// Default fictitious time step for dynamic relaxation.
pub const DEFAULT_DR_STEPSIZE: f64 = 1.0;

/// Default damping factor `Λ` for the dynamic relaxation fictitious mass.
pub const DEFAULT_DR_DAMPING_FACTOR: f64 = 1.0;

/// Upper bound of the adaptive damping coefficient. Anything above it,
/// including the unstable range past 2, is reset to this value.
pub const DR_CN_RESET: f64 = 1.9;

/// Default export cadence (every n-th step).
pub const DEFAULT_EXPORT_EVERY: u32 = 10;

/// Epsilon for floating-point comparisons on geometric quantities.
pub const EPSILON: f64 = 1.0e-12;

/// Horizon as a multiple of the point spacing when a job does not set one.
pub const DEFAULT_HORIZON_FACTOR: f64 = 3.015;
