//! Errors and the status codes they collapse to at the C boundary

use thiserror::Error;

/// Errors reported by [`Engine::update`](crate::Engine::update) and the
/// execution strategies.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Rejected before anything was mutated
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The accelerator could not be acquired
    #[error("execution backend unavailable: {0}")]
    Unavailable(String),

    /// Dispatch or readback failed
    #[error("execution failed: {0}")]
    Execution(String),
}

impl SimulationError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::InvalidArgument(_) => Status::InvalidArgument,
            Self::Unavailable(_) | Self::Execution(_) => Status::ExecutionFailure,
        }
    }
}

/// Integer status returned across the C ABI
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success = 0,
    InvalidArgument = 1,
    ExecutionFailure = 2,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl From<&SimulationError> for Status {
    fn from(err: &SimulationError) -> Self {
        err.status()
    }
}

impl<T> From<&Result<T, SimulationError>> for Status {
    fn from(result: &Result<T, SimulationError>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(err) => err.status(),
        }
    }
}
