use super::super::fixtures::{
    code_samples::{PHP_HELLO, RUBY_HELLO, SHELL_HELLO},
    test_scenarios::SHELL_ORPHAN,
};
use super::*;

#[tokio::test]
async fn test_php_basic() {
    test_language_execution("php", &["php"], PHP_HELLO).await
}

#[tokio::test]
async fn test_ruby_basic() {
    test_language_execution("ruby", &["ruby"], RUBY_HELLO).await
}

#[tokio::test]
async fn test_shell_basic() {
    test_language_execution("bash", &["bash"], SHELL_HELLO).await
}

#[tokio::test]
async fn test_shell_exit_status() {
    let request = ExecutionRequest::new("sh", "echo partial\nexit 3");
    if let Some(result) = run_if_available(&["bash"], request).await {
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.stdout.trim(), "partial");
    }
}

#[tokio::test]
async fn test_shell_background_jobs_do_not_survive_timeout() {
    let request = ExecutionRequest::new("shell", SHELL_ORPHAN).with_timeout(Duration::from_secs(1));
    if let Some(result) = run_if_available(&["bash"], request).await {
        assert_eq!(result.status, ExecutionStatus::Timeout);
        let orphan: i32 = result.stdout.trim().parse().expect("background pid");
        assert!(
            super::super::utils::processes::wait_until_gone(orphan, Duration::from_secs(3)).await
        );
    }
}

#[tokio::test]
async fn test_powershell_basic() {
    test_language_execution("powershell", &["pwsh"], "Write-Output 'Hello from PowerShell!'").await
}
