//! # Code Execution
//!
//! Runs untrusted code snippets in a dozen languages as child processes
//! bounded by a timeout, output caps, rlimits and a process-group kill.
//! In front of the engine sit a sliding-window rate limiter keyed by caller
//! identity and tier, and a substring denylist validator.

mod config;
mod error;
mod executor;
mod languages;
mod rate_limit;
mod sandbox;
mod service;
mod source;
mod types;
mod validator;

#[cfg(test)]
mod tests;

pub use config::{EngineConfig, ServiceConfig, ValidatorConfig};
pub use error::Error;
pub use executor::CodeExecutor;
pub use languages::{lookup as lookup_language, supported_languages, LanguageProfile, PROFILES};
pub use rate_limit::{
    longest_window, LimitType, RateLimitConfig, RateLimitExceeded, RateLimiter, TierLimits,
    DEFAULT_TIER,
};
pub use service::CodeExecutionService;
pub use source::strip_markdown_fences;
pub use types::{ExecutionRequest, ExecutionResult, ExecutionStatus};
pub use validator::{ValidationError, Validator, Verdict, DENYLIST};

/// Result type for code execution operations
pub type Result<T> = std::result::Result<T, Error>;
