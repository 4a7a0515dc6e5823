use std::borrow::Cow;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{
    config::ServiceConfig,
    error::Error,
    executor::CodeExecutor,
    rate_limit::{LimitType, RateLimiter},
    source::strip_markdown_fences,
    types::{ExecutionRequest, ExecutionResult},
    validator::{ValidationError, Validator},
    Result,
};

/// Admission pipeline in front of the engine: rate limiter, fence
/// stripping, validator, concurrency permit, then the executor.
#[derive(Clone)]
pub struct CodeExecutionService {
    executor: Arc<CodeExecutor>,
    validator: Validator,
    rate_limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
    config: Arc<ServiceConfig>,
}

impl CodeExecutionService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            executor: Arc::new(CodeExecutor::new(config.engine.clone())),
            validator: Validator::new(&config.validator),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limits.clone())),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_executions)),
            config: Arc::new(config),
        })
    }

    /// Runs a request for `identity` on `tier`.
    ///
    /// A rate-limit denial or a validation failure is returned as an error
    /// and nothing is spawned. Everything past the gates, including
    /// compile errors and timeouts, is an [`ExecutionResult`].
    pub async fn run(
        &self,
        identity: &str,
        tier: &str,
        mut request: ExecutionRequest,
    ) -> Result<ExecutionResult> {
        if let Err(e) = self
            .rate_limiter
            .check(identity, LimitType::CodeExecutionsPerMinute, tier)
        {
            warn!(identity, tier, "{}", e);
            return Err(e.into());
        }

        let cleaned = match strip_markdown_fences(&request.code) {
            Cow::Owned(code) => Some(code),
            Cow::Borrowed(_) => None,
        };
        if let Some(code) = cleaned {
            debug!("Removed Markdown fences from submitted code");
            request.code = code;
        }

        if let Err(e) = self.validator.validate(&request.language, &request.code) {
            info!(identity, language = %request.language, reason = e.reason(), "Code rejected");
            return Err(e.into());
        }

        self.execute(&request).await
    }

    /// Runs a request through the concurrency gate only, skipping rate
    /// limiting and validation.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| Error::System(format!("Failed to acquire execution permit: {}", e)))?;

        debug!("Starting code execution for language: {}", request.language);
        Ok(self.executor.execute(request).await)
    }

    /// Records one request of `limit_type`, or explains why it was refused.
    pub fn admit(&self, identity: &str, tier: &str, limit_type: LimitType) -> Result<()> {
        self.rate_limiter.check(identity, limit_type, tier)?;
        Ok(())
    }

    /// Validates code the same way [`run`](Self::run) does, fences included,
    /// without executing it.
    pub fn validate(&self, language: &str, code: &str) -> std::result::Result<(), ValidationError> {
        self.validator
            .validate(language, &strip_markdown_fences(code))
    }

    pub fn remaining(&self, identity: &str, tier: &str, limit_type: LimitType) -> u32 {
        self.rate_limiter.get_remaining(identity, limit_type, tier)
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
