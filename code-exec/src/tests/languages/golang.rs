use super::super::fixtures::{
    code_samples::GO_HELLO, failures::GO_PANIC, test_scenarios::GO_WITH_TIMEOUT,
};
use super::*;

#[tokio::test]
async fn test_go_basic() {
    test_language_execution("go", &["go"], GO_HELLO).await
}

#[tokio::test]
async fn test_go_panic_is_runtime_error() {
    let request = ExecutionRequest::new("golang", GO_PANIC);
    if let Some(result) = run_if_available(&["go"], request).await {
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.stderr.contains("index out of range"));
        assert_eq!(result.exit_code, Some(2));
    }
}

#[tokio::test]
async fn test_go_timeout() {
    test_language_timeout("go", &["go"], GO_WITH_TIMEOUT).await
}
