//! Error types and result handling for the Kaizen control plane

use thiserror::Error;

/// Result type alias for Kaizen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the control plane, per the taxonomy in the design spec
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Permanent failure: {0}")]
    Permanent(String),

    #[error("Circuit breaker open for operation: {0}")]
    CircuitOpen(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl Error {
    /// Whether this error is retryable by a failure-recovery executor
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    /// Error category, useful for metrics labels
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "invalid_config",
            Error::InvalidInput(_) => "invalid_input",
            Error::NotFound(_) => "not_found",
            Error::Transient(_) => "transient",
            Error::Permanent(_) => "permanent",
            Error::CircuitOpen(_) => "circuit_open",
            Error::Serialization(_) => "serialization",
            Error::Internal(_) => "internal",
            Error::Generic(_) => "generic",
        }
    }
}
