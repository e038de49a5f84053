//! Runtime error types.

use teleroute_framework::{KernelError, RegistrationError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while setting up or running a [`TelerouteRuntime`].
///
/// [`TelerouteRuntime`]: crate::TelerouteRuntime
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// Installing a shutdown signal handler failed.
    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
