//! Softened Newtonian gravity
//!
//! The GPU kernel in `nbody-simulation` evaluates the same sum; this module is
//! the sequential reference it is checked against.
//!
//! For particle *i*:
//!
//! ```text
//! a_i = G · Σ_{j≠i} m_j · (p_j − p_i) / (|p_j − p_i|² + ε²)^(3/2)
//! ```

use glam::Vec3;

use crate::constants::{GRAVITATIONAL_CONSTANT, SOFTENING};
use crate::particle::Particle;

/// Constants of the force law
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceParams {
    /// Gravitational constant `G`
    pub gravitational_constant: f32,
    /// Softening length `ε` (not squared)
    pub softening: f32,
}

impl ForceParams {
    pub fn new(gravitational_constant: f32, softening: f32) -> Self {
        Self {
            gravitational_constant,
            softening,
        }
    }

    pub fn softening_sq(&self) -> f32 {
        self.softening * self.softening
    }

    /// `G` must be finite, `ε` finite and non-negative.
    pub fn is_valid(&self) -> bool {
        self.gravitational_constant.is_finite()
            && self.softening.is_finite()
            && self.softening >= 0.0
    }
}

impl Default for ForceParams {
    fn default() -> Self {
        Self {
            gravitational_constant: GRAVITATIONAL_CONSTANT,
            softening: SOFTENING,
        }
    }
}

/// Acceleration pulled on `target` by a mass at `source`, without the `G`
/// factor.
#[inline]
pub fn pairwise_acceleration(
    target: Vec3,
    source: Vec3,
    source_mass: f32,
    softening_sq: f32,
) -> Vec3 {
    let r_vec = source - target;
    let dist_sq = r_vec.length_squared() + softening_sq;
    let inv_dist = dist_sq.sqrt().recip();
    r_vec * (source_mass * inv_dist * inv_dist * inv_dist)
}

/// Fill `out[i]` with the acceleration of `snapshot[i]`.
///
/// `snapshot` is only read; callers hand in the start-of-step state and
/// apply the result afterwards.
///
/// # Panics
///
/// Panics if `out` is shorter than `snapshot`.
pub fn compute_accelerations(snapshot: &[Particle], params: &ForceParams, out: &mut [Vec3]) {
    assert!(
        out.len() >= snapshot.len(),
        "acceleration scratch holds {} slots for {} particles",
        out.len(),
        snapshot.len()
    );

    let softening_sq = params.softening_sq();

    for (i, (target, acc)) in snapshot.iter().zip(out.iter_mut()).enumerate() {
        let position = target.position();
        let mut sum = Vec3::ZERO;
        for (j, source) in snapshot.iter().enumerate() {
            // Self term is 0/0 when ε = 0
            if i == j {
                continue;
            }
            sum += pairwise_acceleration(position, source.position(), source.weight, softening_sq);
        }
        *acc = sum * params.gravitational_constant;
    }
}

/// Allocating wrapper around [`compute_accelerations`]
pub fn accelerations(snapshot: &[Particle], params: &ForceParams) -> Vec<Vec3> {
    let mut out = vec![Vec3::ZERO; snapshot.len()];
    compute_accelerations(snapshot, params, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_body() -> [Particle; 2] {
        [
            Particle::at_rest(Vec3::new(-1.0, 0.0, 0.0), 1.0),
            Particle::at_rest(Vec3::new(1.0, 0.0, 0.0), 1.0),
        ]
    }

    #[test]
    fn test_two_body_unsoftened() {
        let acc = accelerations(&two_body(), &ForceParams::new(1.0, 0.0));
        assert!((acc[0] - Vec3::new(0.25, 0.0, 0.0)).length() < 1e-7);
        assert!((acc[1] - Vec3::new(-0.25, 0.0, 0.0)).length() < 1e-7);
    }

    #[test]
    fn test_gravitational_constant_scales_linearly() {
        let base = accelerations(&two_body(), &ForceParams::new(1.0, 0.0));
        let scaled = accelerations(&two_body(), &ForceParams::new(3.0, 0.0));
        assert!((scaled[0] - base[0] * 3.0).length() < 1e-7);
    }

    #[test]
    fn test_softening_reduces_magnitude() {
        let hard = accelerations(&two_body(), &ForceParams::new(1.0, 0.0));
        let soft = accelerations(&two_body(), &ForceParams::new(1.0, 0.5));
        assert!(soft[0].length() < hard[0].length());
        // 2 / (4 + 0.25)^1.5
        let expected = 2.0 / 4.25_f32.powf(1.5);
        assert!((soft[0].x - expected).abs() < 1e-6);
    }

    #[test]
    fn test_coincident_particles_stay_finite_when_softened() {
        let particles = [
            Particle::at_rest(Vec3::ONE, 1.0),
            Particle::at_rest(Vec3::ONE, 1.0),
        ];
        let acc = accelerations(&particles, &ForceParams::new(1.0, 0.01));
        assert_eq!(acc[0], Vec3::ZERO);
        assert_eq!(acc[1], Vec3::ZERO);
    }

    #[test]
    fn test_single_particle_feels_nothing() {
        let particles = [Particle::at_rest(Vec3::new(5.0, -2.0, 1.0), 10.0)];
        let acc = accelerations(&particles, &ForceParams::new(1.0, 0.0));
        assert_eq!(acc, vec![Vec3::ZERO]);
    }

    #[test]
    fn test_pairwise_forces_are_antisymmetric() {
        let particles = [
            Particle::at_rest(Vec3::new(0.3, -0.2, 0.9), 2.0),
            Particle::at_rest(Vec3::new(-0.7, 0.4, 0.1), 5.0),
        ];
        let acc = accelerations(&particles, &ForceParams::default());
        let net = acc[0] * particles[0].weight + acc[1] * particles[1].weight;
        assert!(net.length() < 1e-5);
    }

    #[test]
    fn test_net_force_vanishes_for_random_cluster() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(1);
        let particles: Vec<Particle> = (0..20)
            .map(|_| {
                let position = Vec3::new(
                    rng.random_range(-2.0..2.0),
                    rng.random_range(-2.0..2.0),
                    rng.random_range(-2.0..2.0),
                );
                Particle::at_rest(position, rng.random_range(0.1..3.0))
            })
            .collect();

        let acc = accelerations(&particles, &ForceParams::new(1.0, 0.05));
        let net: Vec3 = acc
            .iter()
            .zip(&particles)
            .map(|(a, p)| *a * p.weight)
            .sum();
        let scale: f32 = acc
            .iter()
            .zip(&particles)
            .map(|(a, p)| a.length() * p.weight)
            .sum();
        assert!(net.length() <= 1e-5 * scale.max(1.0), "net {net}, scale {scale}");
    }

    #[test]
    fn test_params_validation() {
        assert!(ForceParams::default().is_valid());
        assert!(ForceParams::new(1.0, 0.0).is_valid());
        assert!(!ForceParams::new(1.0, -0.1).is_valid());
        assert!(!ForceParams::new(f32::NAN, 0.1).is_valid());
        assert!(!ForceParams::new(1.0, f32::INFINITY).is_valid());
    }
}
