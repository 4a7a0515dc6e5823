use super::super::fixtures::code_samples::TS_HELLO;
use super::*;

#[tokio::test]
async fn test_typescript_basic() {
    test_language_execution("typescript", &["ts-node"], TS_HELLO).await
}

#[tokio::test]
async fn test_typescript_type_error() {
    let request = ExecutionRequest::new("ts", "const count: number = 'three';\nconsole.log(count);");
    if let Some(result) = run_if_available(&["ts-node"], request).await {
        // ts-node type-checks before running, so this never prints.
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.stdout.is_empty());
    }
}
