//! # N-body Simulation Engine
//!
//! Advances caller-owned point masses by one time step under mutual
//! gravity. Forces are evaluated over a read-only snapshot of the whole
//! system, then applied with semi-implicit Euler, either on the GPU
//! ([`ParallelStrategy`]) or on one CPU thread ([`SequentialStrategy`]).

pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod parallel;
pub mod params;
pub mod sequential;
pub mod strategy;

pub use buffer::*;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use parallel::*;
pub use params::*;
pub use sequential::*;
pub use strategy::*;

pub use nbody_physics::{ForceParams, Particle};
