//! Conserved quantities
//!
//! Sums are accumulated in `f64` so the diagnostics are not the limiting
//! factor when checking an `f32` step.

use glam::{DVec3, Vec3};

use crate::forces::ForceParams;
use crate::particle::Particle;

/// Total linear momentum `Σ m·v`
pub fn total_momentum(particles: &[Particle]) -> DVec3 {
    particles
        .iter()
        .map(|p| p.momentum().as_dvec3())
        .fold(DVec3::ZERO, |acc, m| acc + m)
}

/// Total mass `Σ m`
pub fn total_mass(particles: &[Particle]) -> f64 {
    particles.iter().map(|p| p.weight as f64).sum()
}

/// Mass-weighted mean position, `None` when the total mass is zero
pub fn center_of_mass(particles: &[Particle]) -> Option<Vec3> {
    let mass = total_mass(particles);
    if mass == 0.0 {
        return None;
    }
    let weighted = particles
        .iter()
        .map(|p| p.position().as_dvec3() * p.weight as f64)
        .fold(DVec3::ZERO, |acc, x| acc + x);
    Some((weighted / mass).as_vec3())
}

pub fn kinetic_energy(particles: &[Particle]) -> f64 {
    particles.iter().map(|p| p.kinetic_energy() as f64).sum()
}

/// Softened pair potential `−G·m_i·m_j / sqrt(r² + ε²)`, summed once per pair
pub fn potential_energy(particles: &[Particle], params: &ForceParams) -> f64 {
    let g = params.gravitational_constant as f64;
    let softening_sq = params.softening_sq() as f64;
    let mut energy = 0.0;

    for (i, a) in particles.iter().enumerate() {
        let pa = a.position().as_dvec3();
        for b in &particles[i + 1..] {
            let dist_sq = (b.position().as_dvec3() - pa).length_squared() + softening_sq;
            energy -= g * a.weight as f64 * b.weight as f64 / dist_sq.sqrt();
        }
    }

    energy
}

/// Kinetic plus potential energy
pub fn total_energy(particles: &[Particle], params: &ForceParams) -> f64 {
    kinetic_energy(particles) + potential_energy(particles, params)
}
