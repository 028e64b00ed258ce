//! Execution strategy seam
//!
//! Every strategy runs the same two-phase step:
//!
//! 1. **Forces**: read the start-of-step positions and masses of all
//!    particles, write one acceleration per particle into scratch storage.
//! 2. **Integrate**: apply the scratch accelerations to velocities and
//!    positions.
//!
//! No position may change until every acceleration of the step is known.
//! Fusing the phases makes the result depend on iteration order.

use glam::Vec3;
use nbody_physics::{ForceParams, Particle};

use crate::config::Backend;
use crate::error::SimulationError;

/// One acceleration per particle, filled by phase 1 of a single step
#[derive(Debug, Clone)]
pub struct AccelerationScratch {
    accelerations: Vec<Vec3>,
}

impl AccelerationScratch {
    /// Evaluate forces over an immutable snapshot.
    pub fn evaluate(snapshot: &[Particle], forces: &ForceParams) -> Self {
        Self {
            accelerations: nbody_physics::accelerations(snapshot, forces),
        }
    }

    /// Integrate every particle from the stored accelerations.
    pub fn apply(&self, particles: &mut [Particle], dt: f32) {
        nbody_physics::integrate(particles, &self.accelerations, dt);
    }

    pub fn as_slice(&self) -> &[Vec3] {
        &self.accelerations
    }
}

/// A way of distributing the force and integration phases over hardware.
///
/// Strategies are picked once when the [`Engine`](crate::Engine) is built.
pub trait ExecutionStrategy: Send {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    fn kind(&self) -> Backend;

    /// Advance `particles` by `dt`.
    ///
    /// Inputs are already validated by the engine and `particles` is never
    /// empty. On error the slice may only be left untouched, never
    /// half-updated.
    fn step(
        &mut self,
        particles: &mut [Particle],
        forces: &ForceParams,
        dt: f32,
    ) -> Result<(), SimulationError>;
}
