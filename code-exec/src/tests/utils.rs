pub mod defaults {
    use crate::{
        CodeExecutionService, CodeExecutor, EngineConfig, ExecutionRequest, ExecutionResult,
        ServiceConfig,
    };
    use tokio::time::Duration;

    pub fn default_test_config() -> EngineConfig {
        EngineConfig {
            default_timeout: default_timeout(),
            ..EngineConfig::default()
        }
    }

    pub fn test_service(max_concurrent_executions: usize) -> CodeExecutionService {
        CodeExecutionService::new(ServiceConfig {
            max_concurrent_executions,
            engine: default_test_config(),
            ..ServiceConfig::default()
        })
        .unwrap()
    }

    /// Runs code straight through the engine, bypassing the validator.
    pub async fn execute(language: &str, code: &str) -> ExecutionResult {
        CodeExecutor::new(default_test_config())
            .execute(&ExecutionRequest::new(language, code))
            .await
    }

    pub fn default_timeout() -> Duration {
        Duration::from_secs(5)
    }
}

pub mod processes {
    use nix::{errno::Errno, sys::signal::kill, unistd::Pid};
    use tokio::time::{sleep, Duration, Instant};

    /// Whether `pid` no longer exists. Zombies count as gone: they hold no
    /// resources and their reaping is up to whoever adopted them.
    fn is_gone(pid: i32) -> bool {
        if kill(Pid::from_raw(pid), None) == Err(Errno::ESRCH) {
            return true;
        }
        std::fs::read_to_string(format!("/proc/{}/stat", pid))
            .map(|stat| {
                stat.rsplit(')')
                    .next()
                    .map(|rest| rest.trim_start().starts_with('Z'))
                    .unwrap_or(false)
            })
            .unwrap_or(true)
    }

    /// Polls until `pid` is gone or `within` elapses.
    pub async fn wait_until_gone(pid: i32, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if is_gone(pid) {
                return true;
            }
            sleep(Duration::from_millis(50)).await;
        }
        is_gone(pid)
    }
}
