use super::super::fixtures::{
    code_samples::{CPP_HELLO, C_HELLO},
    failures::{CPP_COMPILE_ERROR, CPP_EXIT_ONE},
};
use super::*;

#[tokio::test]
async fn test_cpp_basic() {
    test_language_execution("cpp", &["g++"], CPP_HELLO).await
}

#[tokio::test]
async fn test_c_links_libm() {
    let request = ExecutionRequest::new("c", C_HELLO);
    if let Some(result) = run_if_available(&["gcc"], request).await {
        assert_eq!(result.status, ExecutionStatus::Success, "stderr: {}", result.stderr);
        assert_eq!(result.stdout.trim(), "Hello from C! 4");
    }
}

#[tokio::test]
async fn test_cpp_exit_code_is_reported() {
    let request = ExecutionRequest::new("c++", CPP_EXIT_ONE);
    if let Some(result) = run_if_available(&["g++"], request).await {
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert_eq!(result.exit_code, Some(1));
    }
}

#[tokio::test]
async fn test_cpp_compile_error() {
    let request = ExecutionRequest::new("cpp", CPP_COMPILE_ERROR);
    if let Some(result) = run_if_available(&["g++"], request).await {
        assert_eq!(result.status, ExecutionStatus::CompileError);
        assert!(result.stderr.contains("undeclared_sentinel_identifier"));
    }
}

#[tokio::test]
async fn test_cpp_segfault_is_runtime_error() {
    let code = "int main() { volatile int *p = nullptr; *p = 1; return 0; }";
    if let Some(result) = run_if_available(&["g++"], ExecutionRequest::new("cpp", code)).await {
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.exit_code.is_none());
        assert!(result.stderr.contains("signal"));
    }
}
