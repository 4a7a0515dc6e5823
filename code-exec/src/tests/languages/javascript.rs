use super::super::fixtures::{
    code_samples::JS_HELLO, failures::JS_THROW, test_scenarios::JS_WITH_TIMEOUT,
};
use super::*;

#[tokio::test]
async fn test_javascript_basic() {
    test_language_execution("javascript", &["node"], JS_HELLO).await
}

#[tokio::test]
async fn test_javascript_uncaught_exception() {
    let request = ExecutionRequest::new("js", JS_THROW);
    if let Some(result) = run_if_available(&["node"], request).await {
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.stderr.contains("boom from javascript"));
        assert_eq!(result.exit_code, Some(1));
    }
}

#[tokio::test]
async fn test_javascript_timeout() {
    test_language_timeout("javascript", &["node"], JS_WITH_TIMEOUT).await
}
