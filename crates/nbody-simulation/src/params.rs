//! Per-step uniform block shared by both compute kernels

use bytemuck::{Pod, Zeroable};
use nbody_physics::ForceParams;

/// Matches `StepParams` in `forces.wgsl` and `integrate.wgsl`
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct StepParams {
    /// Number of live particles in the storage buffers
    pub count: u32,
    /// Gravitational constant `G`
    pub gravitational_constant: f32,
    /// `ε²`, precomputed on the CPU
    pub softening_sq: f32,
    /// Time step
    pub dt: f32,
}

impl StepParams {
    pub fn new(count: u32, forces: &ForceParams, dt: f32) -> Self {
        Self {
            count,
            gravitational_constant: forces.gravitational_constant,
            softening_sq: forces.softening_sq(),
            dt,
        }
    }
}
