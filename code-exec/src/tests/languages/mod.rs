use super::utils::defaults::default_test_config;
use crate::{
    languages::skip_if_not_available, CodeExecutor, ExecutionRequest, ExecutionResult,
    ExecutionStatus,
};
use tokio::time::Duration;

pub mod c_family;
pub mod golang;
pub mod java;
pub mod javascript;
pub mod python;
pub mod rust;
pub mod scripting;
pub mod typescript;

/// Runs `code` through the engine, or returns `None` when a tool is missing.
pub(crate) async fn run_if_available(
    tools: &[&str],
    request: ExecutionRequest,
) -> Option<ExecutionResult> {
    if skip_if_not_available(tools) {
        return None;
    }
    Some(CodeExecutor::new(default_test_config()).execute(&request).await)
}

// Common test utilities for language tests
pub(crate) async fn test_language_execution(language: &str, tools: &[&str], code: &str) {
    let Some(result) = run_if_available(tools, ExecutionRequest::new(language, code)).await else {
        return;
    };
    assert_eq!(result.status, ExecutionStatus::Success, "stderr: {}", result.stderr);
    assert!(result.stdout.contains("Hello from"));
    assert!(result.stderr.is_empty(), "stderr: {}", result.stderr);
}

pub(crate) async fn test_language_timeout(language: &str, tools: &[&str], code: &str) {
    let request = ExecutionRequest::new(language, code).with_timeout(Duration::from_secs(1));
    let Some(result) = run_if_available(tools, request).await else {
        return;
    };
    assert_eq!(result.status, ExecutionStatus::Timeout);
    assert!(result.stderr.contains("timed out"));
}
