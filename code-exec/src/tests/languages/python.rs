use super::super::fixtures::{
    code_samples::PYTHON_HELLO,
    failures::PYTHON_DIVIDE_BY_ZERO,
    test_scenarios::{PYTHON_BUSY_LOOP, PYTHON_MULTILINE},
};
use super::*;

#[tokio::test]
async fn test_python_basic() {
    test_language_execution("python", &["python3"], PYTHON_HELLO).await
}

#[tokio::test]
async fn test_python_aliases() {
    for alias in ["py", "python3", "PYTHON"] {
        test_language_execution(alias, &["python3"], PYTHON_HELLO).await
    }
}

#[tokio::test]
async fn test_python_multiline() {
    let request = ExecutionRequest::new("python", PYTHON_MULTILINE);
    if let Some(result) = run_if_available(&["python3"], request).await {
        assert_eq!(result.stdout.trim(), "Factorial of 5 is 120");
    }
}

#[tokio::test]
async fn test_python_traceback() {
    let request = ExecutionRequest::new("python", PYTHON_DIVIDE_BY_ZERO);
    if let Some(result) = run_if_available(&["python3"], request).await {
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.stderr.contains("Traceback"));
    }
}

#[tokio::test]
async fn test_python_timeout() {
    test_language_timeout("python", &["python3"], PYTHON_BUSY_LOOP).await
}
