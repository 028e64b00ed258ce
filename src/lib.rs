//! # N-body
//!
//! Host-facing surface of the step engine: the C entry points existing
//! callers link against, and a loader for tab-separated particle files.

pub mod ffi;
pub mod loader;

pub use ffi::{updateSimulationC, updateSimulationCuda, SimulationData};
pub use loader::{load_particles, parse_particles, write_particles, LoadError};

pub use nbody_physics;
pub use nbody_simulation;
