//! # N-body Physics
//!
//! Point-mass data layout and the reference CPU kernels for Newtonian
//! gravity: pairwise force evaluation, semi-implicit Euler integration and
//! the conserved quantities used to check both.

pub mod constants;
pub mod diagnostics;
pub mod forces;
pub mod integrator;
pub mod particle;

pub use constants::*;
pub use diagnostics::*;
pub use forces::*;
pub use integrator::*;
pub use particle::*;
