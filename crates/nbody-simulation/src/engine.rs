//! Facade: validate, dispatch to the configured strategy, report a status

use nbody_physics::ForceParams;

use crate::buffer::ParticleBuffer;
use crate::config::{Backend, EngineConfig};
use crate::error::{SimulationError, Status};
use crate::parallel::ParallelStrategy;
use crate::sequential::SequentialStrategy;
use crate::strategy::ExecutionStrategy;

/// Advances borrowed particle buffers one time step at a time.
///
/// The strategy is chosen when the engine is built and never changes. The
/// engine keeps no reference to a buffer once [`update`](Self::update)
/// returns.
pub struct Engine {
    strategy: Box<dyn ExecutionStrategy>,
    config: EngineConfig,
}

impl Engine {
    /// Validate `config` and build the strategy it names.
    ///
    /// `Backend::Parallel` fails with [`SimulationError::Unavailable`] when no
    /// adapter can be acquired; `Backend::Auto` falls back to the sequential
    /// strategy instead.
    pub fn new(config: EngineConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let strategy: Box<dyn ExecutionStrategy> = match config.backend {
            Backend::Parallel => Box::new(ParallelStrategy::new()?),
            Backend::Sequential => Box::new(SequentialStrategy::new()),
            Backend::Auto => match ParallelStrategy::new() {
                Ok(gpu) => Box::new(gpu),
                Err(e) => {
                    log::warn!("{e}; falling back to the sequential strategy");
                    Box::new(SequentialStrategy::new())
                }
            },
        };

        log::info!("N-body engine using {}", strategy.name());
        Ok(Self { strategy, config })
    }

    /// Engine with the single-threaded CPU strategy; never touches a GPU.
    pub fn sequential(forces: ForceParams) -> Result<Self, SimulationError> {
        Self::new(EngineConfig {
            backend: Backend::Sequential,
            forces,
        })
    }

    /// Wrap a caller-supplied strategy. `config.backend` is replaced by the
    /// strategy's own kind.
    pub fn with_strategy(
        strategy: Box<dyn ExecutionStrategy>,
        config: EngineConfig,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let config = config.with_backend(strategy.kind());
        Ok(Self { strategy, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn forces(&self) -> &ForceParams {
        &self.config.forces
    }

    pub fn backend(&self) -> Backend {
        self.strategy.kind()
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Advance every particle in `buffer` by `dt`.
    ///
    /// A non-positive or non-finite `dt` is rejected before anything is
    /// touched. An empty buffer is a successful no-op.
    pub fn update(
        &mut self,
        mut buffer: ParticleBuffer<'_>,
        dt: f32,
    ) -> Result<(), SimulationError> {
        validate_time_step(dt)?;
        if buffer.is_empty() {
            return Ok(());
        }

        log::trace!(
            "Stepping {} particles by {} on {}",
            buffer.len(),
            dt,
            self.strategy.name()
        );

        let forces = self.config.forces;
        self.strategy.step(buffer.as_mut_slice(), &forces, dt)
    }

    /// [`update`](Self::update) collapsed to a status code
    pub fn update_status(&mut self, buffer: ParticleBuffer<'_>, dt: f32) -> Status {
        match self.update(buffer, dt) {
            Ok(()) => Status::Success,
            Err(err) => {
                log::debug!("update failed: {err}");
                err.status()
            }
        }
    }
}

/// A time step must be finite and strictly positive.
pub fn validate_time_step(dt: f32) -> Result<(), SimulationError> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        Err(SimulationError::invalid(format!(
            "time step must be finite and positive, got {dt}"
        )))
    }
}
