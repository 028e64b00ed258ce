//! Default physical constants
//!
//! The engine works in natural units: positions, velocities and masses are
//! whatever the host feeds in, and `G` scales the result. Both values are
//! only defaults for [`ForceParams`](crate::ForceParams); every entry point
//! takes them explicitly.

/// Gravitational constant in simulation units
pub const GRAVITATIONAL_CONSTANT: f32 = 1.0;

/// Softening length ε added to the squared separation (as ε²) so that
/// coincident particles produce a finite acceleration
pub const SOFTENING: f32 = 1.0e-3;
