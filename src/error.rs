//! Error types for the Turnstile service.

use std::time::Duration;
use thiserror::Error;

/// Main error type for Turnstile operations.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller-facing layer passed an empty or blank identity
    #[error("Invalid identity: caller identity must not be empty")]
    InvalidIdentity,

    /// gRPC server errors
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::transport::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for TurnstileError {
    fn from(err: config::ConfigError) -> Self {
        TurnstileError::Config(err.to_string())
    }
}

/// A quota rejected the request. Routine, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaExceeded {
    /// The service-wide quota is exhausted
    #[error("Service-wide rate limit exceeded: limit {limit}, retry after {}s", retry_after.as_secs())]
    Global { limit: u64, retry_after: Duration },

    /// The caller's own quota is exhausted
    #[error("User rate limit exceeded: {current}/{limit}, retry after {}s", retry_after.as_secs())]
    Identity {
        limit: u64,
        current: u64,
        retry_after: Duration,
    },
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
