//! Service configuration.
//!
//! Every section has defaults, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! max_concurrent_executions = 10
//!
//! [engine]
//! default_timeout = 10.0
//! max_timeout = 30.0
//! output_limit = 1048576
//!
//! [rate_limits.tiers.premium]
//! code_executions_per_minute = 25
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{error::Error, rate_limit::RateLimitConfig, types::duration_serde, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(30);
pub const COMPILE_TIMEOUT: Duration = Duration::from_secs(30);
pub const OUTPUT_LIMIT: usize = 1024 * 1024; // 1MB
pub const MEMORY_LIMIT: u64 = 100 * 1024 * 1024; // 100MB
pub const MAX_MEMORY_LIMIT: u64 = 512 * 1024 * 1024; // 512MB
pub const FILE_SIZE_LIMIT: u64 = 10 * 1024 * 1024; // 10MB
pub const MAX_SOURCE_SIZE: usize = 1024 * 1024; // 1MB
pub const INHERITED_ENV: &[&str] = &[
    "RUSTUP_HOME",
    "RUSTUP_TOOLCHAIN",
    "CARGO_HOME",
    "GOROOT",
    "GOPATH",
    "GOCACHE",
    "JAVA_HOME",
];

/// Limits applied by the execution engine to every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run timeout used when the request does not supply one
    #[serde(with = "duration_serde")]
    pub default_timeout: Duration,
    /// Hard ceiling on any run timeout, whatever the caller asks for
    #[serde(with = "duration_serde")]
    pub max_timeout: Duration,
    /// Timeout for the compile step of compiled languages
    #[serde(with = "duration_serde")]
    pub compile_timeout: Duration,
    /// Cap on captured bytes per stream (stdout and stderr separately)
    pub output_limit: usize,
    /// Address-space limit in bytes for languages that tolerate one
    pub memory_limit: u64,
    /// Hard ceiling on per-request memory overrides
    pub max_memory_limit: u64,
    /// Largest file a program may write
    pub file_size_limit: u64,
    /// Parent directory for per-call temporary directories; the system
    /// temporary directory when unset
    pub temp_dir: Option<PathBuf>,
    /// Host variables copied into the otherwise empty child environment,
    /// for toolchains that cannot find themselves without them
    pub inherit_env: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            max_timeout: MAX_TIMEOUT,
            compile_timeout: COMPILE_TIMEOUT,
            output_limit: OUTPUT_LIMIT,
            memory_limit: MEMORY_LIMIT,
            max_memory_limit: MAX_MEMORY_LIMIT,
            file_size_limit: FILE_SIZE_LIMIT,
            temp_dir: None,
            inherit_env: INHERITED_ENV.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl EngineConfig {
    /// Run timeout for a request: the default when absent or zero, never
    /// above the hard ceiling.
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        let timeout = match requested {
            Some(timeout) if !timeout.is_zero() => timeout,
            _ => self.default_timeout,
        };
        timeout.min(self.max_timeout)
    }

    /// Memory limit for a request, never above the hard ceiling.
    pub fn effective_memory_limit(&self, requested: Option<u64>) -> u64 {
        match requested {
            Some(bytes) if bytes > 0 => bytes.min(self.max_memory_limit),
            _ => self.memory_limit.min(self.max_memory_limit),
        }
    }

    fn check(&self) -> Result<()> {
        if self.max_timeout.is_zero() || self.compile_timeout.is_zero() {
            return Err(Error::Config("timeouts must be greater than zero".to_string()));
        }
        if self.default_timeout > self.max_timeout {
            return Err(Error::Config(format!(
                "default_timeout ({:?}) exceeds max_timeout ({:?})",
                self.default_timeout, self.max_timeout
            )));
        }
        if self.output_limit == 0 {
            return Err(Error::Config("output_limit must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Limits applied by the pre-execution validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Largest accepted source text in bytes
    pub max_source_size: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_source_size: MAX_SOURCE_SIZE,
        }
    }
}

/// Complete configuration of a [`CodeExecutionService`](crate::CodeExecutionService).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Number of executions allowed to run at the same time
    pub max_concurrent_executions: usize,
    pub engine: EngineConfig,
    pub validator: ValidatorConfig,
    pub rate_limits: RateLimitConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 10,
            engine: EngineConfig::default(),
            validator: ValidatorConfig::default(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_executions == 0 {
            return Err(Error::Config(
                "max_concurrent_executions must be greater than zero".to_string(),
            ));
        }
        self.engine.check()?;
        self.rate_limits.check()
    }
}
