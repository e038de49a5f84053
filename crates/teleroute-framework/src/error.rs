//! Error types for the dispatch kernel.
//!
//! Only [`KernelError`] and [`RegistrationError`] ever leave the public API as
//! hard failures. [`AttributeError`] is local to handler code, and
//! [`GroupFailure`] is caught by the orchestrator, logged, and reported through
//! the lifecycle events without interrupting dispatch.

use thiserror::Error;

use teleroute_core::SourceError;

pub use tower::BoxError;

/// A request or response attribute lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// No attribute is stored under the key.
    #[error("attribute '{0}' not found")]
    NotFound(String),

    /// An attribute exists under the key but holds a different type.
    #[error("attribute '{key}' is not a {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
    },
}

/// A plugin or handler group could not be registered.
///
/// Raised synchronously by the registration call; the group table is left
/// exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("plugin name must not be empty")]
    EmptyPluginName,

    #[error("plugin '{0}' is already registered")]
    DuplicatePlugin(String),

    /// A handler group was built without a terminal request handler.
    #[error("handler group '{0}' has no request handler")]
    MissingHandler(String),
}

/// Why a single handler group failed while handling an update.
#[derive(Debug, Error)]
pub enum GroupFailure {
    #[error("checker panicked: {0}")]
    CheckerPanicked(String),

    /// A middleware or the terminal handler returned an error.
    #[error("request handler failed: {0}")]
    HandlerFailed(BoxError),

    #[error("request handler panicked: {0}")]
    HandlerPanicked(String),
}

/// Errors returned by the orchestrator's public API.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The orchestrator was asked to run with invalid settings.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The update source failed to produce a batch.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl KernelError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// Result type for orchestrator operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Result type for attribute lookups.
pub type AttributeResult<T> = Result<T, AttributeError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(err: &KernelError) -> &'static str {
        match err {
            KernelError::Configuration(_) => "configuration",
            KernelError::Source(_) => "source",
        }
    }

    #[test]
    fn test_kernel_error_variants() {
        let err = KernelError::configuration("timeout must not be negative");
        assert_eq!(describe(&err), "configuration");
        assert_eq!(
            err.to_string(),
            "invalid configuration: timeout must not be negative"
        );

        let err = KernelError::from(SourceError::Closed);
        assert_eq!(describe(&err), "source");
        assert_eq!(err.to_string(), "update source closed");
    }
}
