//! Engine configuration, fixed when the engine is built

use std::fmt;
use std::str::FromStr;

use nbody_physics::ForceParams;

use crate::error::SimulationError;

/// Which execution strategy the engine is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Data-parallel GPU compute through wgpu
    Parallel,
    /// Single-threaded CPU reference
    Sequential,
    /// Parallel when an adapter is available, sequential otherwise
    #[default]
    Auto,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Parallel => write!(f, "parallel"),
            Backend::Sequential => write!(f, "sequential"),
            Backend::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for Backend {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parallel" | "gpu" => Ok(Backend::Parallel),
            "sequential" | "cpu" => Ok(Backend::Sequential),
            "auto" => Ok(Backend::Auto),
            other => Err(SimulationError::invalid(format!("unknown backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineConfig {
    pub backend: Backend,
    pub forces: ForceParams,
}

impl EngineConfig {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            ..Default::default()
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_gravitational_constant(mut self, g: f32) -> Self {
        self.forces.gravitational_constant = g;
        self
    }

    pub fn with_softening(mut self, softening: f32) -> Self {
        self.forces.softening = softening;
        self
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if !self.forces.is_valid() {
            return Err(SimulationError::invalid(format!(
                "G must be finite and softening finite and non-negative (G = {}, softening = {})",
                self.forces.gravitational_constant, self.forces.softening
            )));
        }
        Ok(())
    }
}
