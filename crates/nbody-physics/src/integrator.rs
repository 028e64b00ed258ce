//! Semi-implicit (symplectic) Euler
//!
//! ```text
//! v ← v + a·dt
//! p ← p + v·dt
//! ```
//!
//! The position update uses the already-updated velocity. No clamping or
//! sub-stepping is performed; a stable `dt` is the caller's choice.

use glam::Vec3;

use crate::particle::Particle;

/// Advance one particle given its acceleration.
#[inline]
pub fn integrate_particle(particle: &mut Particle, acceleration: Vec3, dt: f32) {
    let velocity = particle.velocity() + acceleration * dt;
    let position = particle.position() + velocity * dt;
    particle.set_velocity(velocity);
    particle.set_position(position);
}

/// Advance every particle from its precomputed acceleration.
///
/// # Panics
///
/// Panics if fewer accelerations than particles are supplied.
pub fn integrate(particles: &mut [Particle], accelerations: &[Vec3], dt: f32) {
    assert!(
        accelerations.len() >= particles.len(),
        "{} accelerations for {} particles",
        accelerations.len(),
        particles.len()
    );

    for (particle, &acceleration) in particles.iter_mut().zip(accelerations) {
        integrate_particle(particle, acceleration, dt);
    }
}
