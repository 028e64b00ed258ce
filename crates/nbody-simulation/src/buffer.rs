//! Borrowed view over caller-owned particles
//!
//! The engine never allocates, frees or keeps particle storage. A
//! [`ParticleBuffer`] lives for exactly one update call.

use nbody_physics::Particle;

use crate::error::SimulationError;

/// Mutable view over `nbodies` contiguous particles owned by the caller
#[derive(Debug)]
pub struct ParticleBuffer<'a> {
    particles: &'a mut [Particle],
}

impl<'a> ParticleBuffer<'a> {
    pub fn new(particles: &'a mut [Particle]) -> Self {
        Self { particles }
    }

    /// Build a view from a foreign pointer and count.
    ///
    /// `nbodies == 0` yields an empty view whatever `data` is. Otherwise a
    /// null or misaligned `data`, or a negative count, is rejected.
    ///
    /// # Safety
    ///
    /// When `nbodies > 0`, `data` must point to `nbodies` initialized
    /// particles that stay valid, and are not accessed through any other
    /// path, for the lifetime `'a`.
    pub unsafe fn from_raw_parts(
        data: *mut Particle,
        nbodies: i32,
    ) -> Result<Self, SimulationError> {
        if nbodies < 0 {
            return Err(SimulationError::invalid(format!(
                "negative particle count {nbodies}"
            )));
        }
        if nbodies == 0 {
            return Ok(Self { particles: &mut [] });
        }
        if data.is_null() {
            return Err(SimulationError::invalid(format!(
                "null particle array with {nbodies} particles"
            )));
        }
        if data.align_offset(std::mem::align_of::<Particle>()) != 0 {
            return Err(SimulationError::invalid("misaligned particle array"));
        }

        // SAFETY: non-null, aligned, positive length; validity and exclusivity
        // are the caller's contract.
        let particles = unsafe { std::slice::from_raw_parts_mut(data, nbodies as usize) };
        Ok(Self { particles })
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn as_slice(&self) -> &[Particle] {
        self.particles
    }

    pub fn as_mut_slice(&mut self) -> &mut [Particle] {
        self.particles
    }
}

impl<'a> From<&'a mut [Particle]> for ParticleBuffer<'a> {
    fn from(particles: &'a mut [Particle]) -> Self {
        Self::new(particles)
    }
}

impl<'a> From<&'a mut Vec<Particle>> for ParticleBuffer<'a> {
    fn from(particles: &'a mut Vec<Particle>) -> Self {
        Self::new(particles.as_mut_slice())
    }
}
