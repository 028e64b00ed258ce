//! Single-threaded reference strategy

use nbody_physics::{ForceParams, Particle};

use crate::config::Backend;
use crate::error::SimulationError;
use crate::strategy::{AccelerationScratch, ExecutionStrategy};

/// Runs both phases on the calling thread.
///
/// Deterministic, so it serves as the reference the parallel strategy is
/// compared against and as the fallback when no adapter exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialStrategy;

impl SequentialStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutionStrategy for SequentialStrategy {
    fn name(&self) -> &str {
        "sequential (cpu)"
    }

    fn kind(&self) -> Backend {
        Backend::Sequential
    }

    fn step(
        &mut self,
        particles: &mut [Particle],
        forces: &ForceParams,
        dt: f32,
    ) -> Result<(), SimulationError> {
        // Shared borrow ends before the mutable one starts
        let scratch = AccelerationScratch::evaluate(particles, forces);
        scratch.apply(particles, dt);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_step_uses_start_of_step_positions() {
        // A fused loop would move particle 0 before particle 1 reads it,
        // giving the pair unequal speeds.
        let mut particles = [
            Particle::at_rest(Vec3::new(-1.0, 0.0, 0.0), 1.0),
            Particle::at_rest(Vec3::new(1.0, 0.0, 0.0), 1.0),
        ];
        SequentialStrategy
            .step(&mut particles, &ForceParams::new(1.0, 0.0), 0.5)
            .unwrap();
        assert_eq!(particles[0].vel[0], -particles[1].vel[0]);
        assert_eq!(particles[0].pos[0], -particles[1].pos[0]);
    }

    #[test]
    fn test_scratch_holds_one_slot_per_particle() {
        let particles = vec![Particle::at_rest(Vec3::ZERO, 1.0); 5];
        let scratch = AccelerationScratch::evaluate(&particles, &ForceParams::default());
        assert_eq!(scratch.as_slice().len(), 5);
    }
}
