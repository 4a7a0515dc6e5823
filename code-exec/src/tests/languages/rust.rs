use super::super::fixtures::{
    code_samples::RUST_HELLO,
    failures::RUST_COMPILE_ERROR,
    test_scenarios::{RUST_WITH_INPUT, RUST_WITH_TIMEOUT},
};
use super::*;

#[tokio::test]
async fn test_rust_basic() {
    test_language_execution("rust", &["rustc"], RUST_HELLO).await
}

#[tokio::test]
async fn test_rust_compile_error() {
    let request = ExecutionRequest::new("rs", RUST_COMPILE_ERROR);
    if let Some(result) = run_if_available(&["rustc"], request).await {
        assert_eq!(result.status, ExecutionStatus::CompileError);
        assert!(result.stderr.contains("mismatched types"));
    }
}

#[tokio::test]
async fn test_rust_reads_stdin() {
    let request = ExecutionRequest::new("rust", RUST_WITH_INPUT).with_stdin("1 2 3\n4\n");
    if let Some(result) = run_if_available(&["rustc"], request).await {
        assert_eq!(result.status, ExecutionStatus::Success, "stderr: {}", result.stderr);
        assert_eq!(result.stdout.trim(), "sum=10");
    }
}

#[tokio::test]
async fn test_rust_timeout() {
    test_language_timeout("rust", &["rustc"], RUST_WITH_TIMEOUT).await
}
