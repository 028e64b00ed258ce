//! Headless N-body driver
//!
//! Loads a particle file, steps it a fixed number of times and reports
//! throughput and conservation diagnostics.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use nbody::{load_particles, write_particles};
use nbody_physics::{
    center_of_mass, total_energy, total_momentum, Particle, GRAVITATIONAL_CONSTANT, SOFTENING,
};
use nbody_simulation::{Backend, Engine, EngineConfig, ForceParams, ParticleBuffer};

#[derive(Parser, Debug)]
#[command(name = "nbody", version, about = "Step a gravitating particle system")]
struct Args {
    /// Tab-separated particle file with a `px py pz vx vy vz m` header
    #[arg(short, long)]
    input: PathBuf,

    /// Time step
    #[arg(long, default_value_t = 0.001)]
    dt: f32,

    /// Number of steps to run
    #[arg(short, long, default_value_t = 1000)]
    steps: usize,

    /// Log diagnostics every this many steps
    #[arg(long, default_value_t = 100)]
    report_every: usize,

    /// parallel, sequential or auto
    #[arg(short, long, default_value_t = Backend::Auto)]
    backend: Backend,

    /// Gravitational constant
    #[arg(long, default_value_t = GRAVITATIONAL_CONSTANT)]
    gravity: f32,

    /// Softening length added to every pair distance
    #[arg(long, default_value_t = SOFTENING)]
    softening: f32,

    /// Write the final state here, in the input format
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    // RUST_LOG=debug for per-step output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.report_every == 0 {
        bail!("--report-every must be at least 1");
    }

    let mut particles = load_particles(&args.input)
        .with_context(|| format!("loading {}", args.input.display()))?;
    log::info!(
        "Loaded {} particles from {}",
        particles.len(),
        args.input.display()
    );

    let config = EngineConfig::new(args.backend)
        .with_gravitational_constant(args.gravity)
        .with_softening(args.softening);
    let mut engine = Engine::new(config).context("building the engine")?;
    let forces = *engine.forces();

    let initial_energy = total_energy(&particles, &forces);
    report(0, &particles, &forces, None);

    let started = Instant::now();
    let mut window_start = started;
    let mut window_steps = 0usize;

    for step in 1..=args.steps {
        engine
            .update(ParticleBuffer::from(&mut particles), args.dt)
            .with_context(|| format!("step {step}"))?;
        window_steps += 1;

        if step % args.report_every == 0 || step == args.steps {
            let elapsed = window_start.elapsed().as_secs_f64();
            let rate = (elapsed > 0.0).then(|| window_steps as f64 / elapsed);
            report(step, &particles, &forces, rate);
            window_start = Instant::now();
            window_steps = 0;
        }
    }

    let final_energy = total_energy(&particles, &forces);
    let drift = if initial_energy != 0.0 {
        (final_energy - initial_energy) / initial_energy.abs()
    } else {
        final_energy - initial_energy
    };
    log::info!(
        "{} steps on {} in {:.2?}; relative energy drift {drift:+.3e}",
        args.steps,
        engine.strategy_name(),
        started.elapsed()
    );

    if let Some(path) = &args.output {
        let file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_particles(BufWriter::new(file), &particles)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("Wrote final state to {}", path.display());
    }

    Ok(())
}

fn report(step: usize, particles: &[Particle], forces: &ForceParams, rate: Option<f64>) {
    let energy = total_energy(particles, forces);
    let momentum = total_momentum(particles);
    let center = center_of_mass(particles).unwrap_or_default();

    match rate {
        Some(rate) => log::info!(
            "step {step:>6}: {rate:>9.1} steps/s  E = {energy:+.6e}  |p| = {:.3e}  com = {center}",
            momentum.length()
        ),
        None => log::info!(
            "step {step:>6}: E = {energy:+.6e}  |p| = {:.3e}  com = {center}",
            momentum.length()
        ),
    }
}
