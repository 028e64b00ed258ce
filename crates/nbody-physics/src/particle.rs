//! Point-mass record shared by the CPU kernels, the GPU buffers and the C ABI

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// One point mass.
///
/// Layout is fixed: three `f32` position components, three `f32` velocity
/// components, then the mass, packed in that order with 4-byte alignment
/// (28 bytes). Foreign callers hand us arrays of exactly this struct, and the
/// WGSL kernels index the same bytes with a stride of seven floats.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// Position in 3D space
    pub pos: [f32; 3],
    /// Velocity vector
    pub vel: [f32; 3],
    /// Mass of the particle
    pub weight: f32,
}

/// Number of `f32` words per particle in a GPU storage buffer
pub const PARTICLE_STRIDE: usize = std::mem::size_of::<Particle>() / std::mem::size_of::<f32>();

impl Particle {
    pub fn new(position: Vec3, velocity: Vec3, mass: f32) -> Self {
        Self {
            pos: position.to_array(),
            vel: velocity.to_array(),
            weight: mass,
        }
    }

    /// Particle at rest
    pub fn at_rest(position: Vec3, mass: f32) -> Self {
        Self::new(position, Vec3::ZERO, mass)
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.pos)
    }

    pub fn velocity(&self) -> Vec3 {
        Vec3::from_array(self.vel)
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.pos = position.to_array();
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.vel = velocity.to_array();
    }

    /// Linear momentum `m·v`
    pub fn momentum(&self) -> Vec3 {
        self.velocity() * self.weight
    }

    /// Kinetic energy `½·m·|v|²`
    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.weight * self.velocity().length_squared()
    }
}
