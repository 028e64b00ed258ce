//! Physical checks on whole steps through the engine facade

use glam::Vec3;
use nbody_physics::{total_energy, total_momentum, ForceParams, Particle};
use nbody_simulation::{
    Engine, ExecutionStrategy, ParallelStrategy, ParticleBuffer, SequentialStrategy, Status,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_cluster(count: usize, seed: u64) -> Vec<Particle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let position = Vec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            let velocity = Vec3::new(
                rng.random_range(-0.5..0.5),
                rng.random_range(-0.5..0.5),
                rng.random_range(-0.5..0.5),
            );
            Particle::new(position, velocity, rng.random_range(0.5..2.0))
        })
        .collect()
}

#[test]
fn two_body_analytic_step() {
    let mut engine = Engine::sequential(ForceParams::new(1.0, 0.0)).unwrap();
    let mut particles = vec![
        Particle::at_rest(Vec3::new(-1.0, 0.0, 0.0), 1.0),
        Particle::at_rest(Vec3::new(1.0, 0.0, 0.0), 1.0),
    ];

    engine
        .update(ParticleBuffer::from(&mut particles), 0.01)
        .unwrap();

    // |a| = G·m / d² = 0.25, toward the other body
    assert!((particles[0].velocity() - Vec3::new(0.0025, 0.0, 0.0)).length() < 1e-8);
    assert!((particles[1].velocity() - Vec3::new(-0.0025, 0.0, 0.0)).length() < 1e-8);
    assert!((particles[0].position() - Vec3::new(-0.999975, 0.0, 0.0)).length() < 1e-6);
    assert!((particles[1].position() - Vec3::new(0.999975, 0.0, 0.0)).length() < 1e-6);
    assert_eq!(particles[0].weight, 1.0);
    assert_eq!(particles[1].weight, 1.0);
}

#[test]
fn momentum_is_conserved() {
    let forces = ForceParams::new(1.0, 0.01);
    let mut engine = Engine::sequential(forces).unwrap();
    let mut particles = random_cluster(32, 7);
    let dt = 0.01;

    let before = total_momentum(&particles);

    // Σ m·|a|·dt bounds the size of the momentum change being cancelled
    let scale: f64 = nbody_physics::accelerations(&particles, &forces)
        .iter()
        .zip(&particles)
        .map(|(a, p)| (a.length() * p.weight * dt) as f64)
        .sum();

    engine
        .update(ParticleBuffer::from(&mut particles), dt)
        .unwrap();

    let drift = (total_momentum(&particles) - before).length();
    assert!(
        drift <= 1e-5 * (1.0 + scale),
        "momentum drifted by {drift:.3e} (scale {scale:.3e})"
    );
}

#[test]
fn circular_orbit_energy_drift_is_bounded() {
    // Two unit-separated half masses on a circular orbit: v = 0.5, period 2π
    let forces = ForceParams::new(1.0, 0.0);
    let mut engine = Engine::sequential(forces).unwrap();
    let mut particles = vec![
        Particle::new(Vec3::new(-0.5, 0.0, 0.0), Vec3::new(0.0, -0.5, 0.0), 0.5),
        Particle::new(Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.0, 0.5, 0.0), 0.5),
    ];

    let initial = total_energy(&particles, &forces);
    assert!((initial + 0.125).abs() < 1e-6);

    let dt = 1.0e-3;
    let steps = (std::f64::consts::TAU / dt as f64).ceil() as usize;
    let mut worst = 0.0_f64;
    for _ in 0..steps {
        engine
            .update(ParticleBuffer::from(&mut particles), dt)
            .unwrap();
        let drift = ((total_energy(&particles, &forces) - initial) / initial).abs();
        worst = worst.max(drift);
    }

    assert!(worst < 1e-2, "relative energy drift {worst:.3e} over one period");

    // Still bound and roughly where it started
    let separation = (particles[1].position() - particles[0].position()).length();
    assert!((separation - 1.0).abs() < 0.05, "separation {separation}");
}

#[test]
fn step_is_independent_of_particle_order() {
    let forces = ForceParams::new(1.0, 0.05);
    let mut engine = Engine::sequential(forces).unwrap();

    let mut forward = random_cluster(16, 11);
    let mut reversed: Vec<Particle> = forward.iter().rev().copied().collect();

    engine.update(ParticleBuffer::from(&mut forward), 0.01).unwrap();
    engine.update(ParticleBuffer::from(&mut reversed), 0.01).unwrap();

    for (a, b) in forward.iter().zip(reversed.iter().rev()) {
        assert!((a.position() - b.position()).length() < 1e-5);
        assert!((a.velocity() - b.velocity()).length() < 1e-5);
    }
}

#[test]
fn invalid_time_step_leaves_bytes_untouched() {
    let mut engine = Engine::sequential(ForceParams::default()).unwrap();
    let mut particles = random_cluster(8, 3);
    let before: Vec<u8> = bytemuck::cast_slice(&particles).to_vec();

    for dt in [0.0_f32, -1.0, f32::NAN] {
        let status = engine.update_status(ParticleBuffer::from(&mut particles), dt);
        assert_eq!(status, Status::InvalidArgument);
    }

    let after: &[u8] = bytemuck::cast_slice(&particles);
    assert_eq!(before.as_slice(), after);
}

#[test]
fn null_particles_with_count_rejected() {
    let result = unsafe { ParticleBuffer::from_raw_parts(std::ptr::null_mut(), 4) };
    assert_eq!(result.unwrap_err().status(), Status::InvalidArgument);
}

#[test]
fn zero_count_is_repeatable_noop() {
    let mut engine = Engine::sequential(ForceParams::default()).unwrap();
    for _ in 0..5 {
        let buffer = unsafe { ParticleBuffer::from_raw_parts(std::ptr::null_mut(), 0) }.unwrap();
        assert_eq!(engine.update_status(buffer, 0.01), Status::Success);
    }
}

#[test]
fn parallel_matches_sequential() {
    let mut gpu = match ParallelStrategy::new() {
        Ok(gpu) => gpu,
        Err(e) => {
            println!("Skipping: {e}");
            return;
        }
    };

    let forces = ForceParams::new(1.0, 0.05);
    // Spans two workgroups so the tiling and bounds checks are exercised
    let initial = random_cluster(300, 42);
    let mut on_gpu = initial.clone();
    let mut on_cpu = initial;

    gpu.step(&mut on_gpu, &forces, 0.005).unwrap();
    SequentialStrategy.step(&mut on_cpu, &forces, 0.005).unwrap();

    let tolerance = 1e-4;
    for (i, (g, c)) in on_gpu.iter().zip(&on_cpu).enumerate() {
        for k in 0..3 {
            let pos_err = (g.pos[k] - c.pos[k]).abs() / c.pos[k].abs().max(1.0);
            let vel_err = (g.vel[k] - c.vel[k]).abs() / c.vel[k].abs().max(1.0);
            assert!(
                pos_err < tolerance,
                "particle {i} pos[{k}]: gpu {} cpu {}",
                g.pos[k],
                c.pos[k]
            );
            assert!(
                vel_err < tolerance,
                "particle {i} vel[{k}]: gpu {} cpu {}",
                g.vel[k],
                c.vel[k]
            );
        }
        assert_eq!(g.weight, c.weight);
    }
}
