use thiserror::Error;

use crate::{rate_limit::RateLimitExceeded, validator::ValidationError};

/// Failures that happen before a request reaches the execution engine, or
/// while the service itself is being set up.
///
/// Execution outcomes (compile errors, crashes, timeouts) are never
/// reported through this type; they come back as an
/// [`ExecutionResult`](crate::ExecutionResult).
#[derive(Error, Debug)]
pub enum Error {
    #[error("Rate limit exceeded: {0}")]
    RateLimited(#[from] RateLimitExceeded),

    #[error("Code validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("System error: {0}")]
    System(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
