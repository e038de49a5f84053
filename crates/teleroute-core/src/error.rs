//! Error types shared by the core collaborators.
//!
//! Kernel-level errors (registration, attributes, group failures) live in
//! `teleroute-framework`.

use thiserror::Error;

// =============================================================================
// Source Errors
// =============================================================================

/// Errors raised by an [`UpdateSource`](crate::UpdateSource) while pulling updates.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The payload could not be decoded into an update.
    #[error("failed to parse update: {0}")]
    Parse(#[from] serde_json::Error),

    /// The source is closed and will never yield again.
    #[error("update source closed")]
    Closed,

    /// Transport-specific failure.
    #[error("update source error: {0}")]
    Other(String),
}

impl SourceError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Error type for outbound API calls made through an [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No transport is attached to this client.
    #[error("API client is not connected")]
    NotConnected,
    /// The remote service rejected the call.
    #[error("API error ({code}): {description}")]
    Remote { code: i64, description: String },
    /// Failed to serialize or deserialize.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for update sources.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;
