use nix::sys::signal::Signal;
use std::env;
use std::ffi::OsString;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::EngineConfig,
    error::Error,
    languages::{self, Invocation, LanguageProfile, Placeholders},
    sandbox::{ProcessExit, ProcessLimits, Sandbox},
    types::{ExecutionRequest, ExecutionResult, ExecutionStatus},
    Result,
};

/// Compilers write object files and binaries well above what a program
/// is allowed to write at run time.
const COMPILE_FILE_SIZE_LIMIT: u64 = 256 * 1024 * 1024;

/// Runs one request: write, compile if needed, run, classify.
///
/// Every request gets a fresh [`Sandbox`], so concurrent calls share
/// nothing on disk.
pub struct CodeExecutor {
    config: EngineConfig,
    toolchain_env: Vec<(OsString, OsString)>,
}

impl CodeExecutor {
    pub fn new(config: EngineConfig) -> Self {
        let toolchain_env = toolchain_env(&config.inherit_env);
        Self {
            config,
            toolchain_env,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Executes a request and always produces a result; failures of the
    /// machinery itself come back as [`ExecutionStatus::InternalError`].
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let started = Instant::now();

        let Some(profile) = languages::lookup(&request.language) else {
            debug!(language = %request.language, "Unsupported language requested");
            return ExecutionResult::failure(
                ExecutionStatus::UnsupportedLanguage,
                None,
                format!(
                    "Language '{}' is not supported. Supported languages: {}",
                    request.language,
                    languages::supported_languages().join(", ")
                ),
                started.elapsed(),
            );
        };

        let sandbox = match Sandbox::new(self.config.temp_dir.as_deref()).await {
            Ok(sandbox) => sandbox.with_env(self.toolchain_env.clone()),
            Err(e) => return internal_error(profile, e, started),
        };

        let result = match self.execute_in_sandbox(profile, request, &sandbox).await {
            Ok(mut result) => {
                result.execution_time = started.elapsed();
                result
            }
            Err(e) => internal_error(profile, e, started),
        };

        if let Err(e) = sandbox.close() {
            warn!("{}", e);
        }

        info!(
            language = profile.id,
            status = %result.status,
            exit_code = ?result.exit_code,
            elapsed_ms = result.execution_time.as_millis() as u64,
            "Code execution finished"
        );
        result
    }

    async fn execute_in_sandbox(
        &self,
        profile: &LanguageProfile,
        request: &ExecutionRequest,
        sandbox: &Sandbox,
    ) -> Result<ExecutionResult> {
        let unique = Uuid::new_v4().simple().to_string();
        let source = sandbox
            .write_source(&profile.source_file_name(&unique), &request.code)
            .await?;
        let placeholders = Placeholders {
            source,
            binary: sandbox.root_dir().join(format!("program-{}", unique)),
            dir: sandbox.root_dir().to_path_buf(),
        };

        if let Some(template) = profile.compile {
            let compile = invocation(profile, template, &placeholders)?;
            let limits = ProcessLimits {
                timeout: self.config.compile_timeout,
                output_limit: self.config.output_limit,
                memory: None,
                file_size: self.config.file_size_limit.max(COMPILE_FILE_SIZE_LIMIT),
            };

            debug!(language = profile.id, "Compiling");
            let output = sandbox.execute(&compile, None, &limits).await?;
            match output.exit {
                ProcessExit::Exited(0) => {}
                ProcessExit::TimedOut => {
                    return Ok(ExecutionResult {
                        status: ExecutionStatus::Timeout,
                        language: Some(profile.id.to_string()),
                        stdout: output.stdout,
                        stderr: with_notice(
                            output.stderr,
                            &format!(
                                "Compilation timed out after {} seconds",
                                limits.timeout.as_secs()
                            ),
                        ),
                        exit_code: None,
                        execution_time: output.elapsed,
                    });
                }
                ProcessExit::Exited(code) => {
                    return Ok(ExecutionResult {
                        status: ExecutionStatus::CompileError,
                        language: Some(profile.id.to_string()),
                        stdout: output.stdout,
                        stderr: output.stderr,
                        exit_code: Some(code),
                        execution_time: output.elapsed,
                    });
                }
                ProcessExit::Signaled(signal) => {
                    return Ok(ExecutionResult {
                        status: ExecutionStatus::CompileError,
                        language: Some(profile.id.to_string()),
                        stdout: output.stdout,
                        stderr: with_notice(
                            output.stderr,
                            &format!("Compiler terminated by signal {}", signal),
                        ),
                        exit_code: None,
                        execution_time: output.elapsed,
                    });
                }
            }
        }

        let run = invocation(profile, profile.run, &placeholders)?;
        let limits = ProcessLimits {
            timeout: self.config.effective_timeout(request.timeout),
            output_limit: self.config.output_limit,
            memory: profile
                .limit_address_space
                .then(|| self.config.effective_memory_limit(request.memory_limit)),
            file_size: self.config.file_size_limit,
        };

        let output = sandbox
            .execute(&run, request.stdin.as_deref(), &limits)
            .await?;
        let timeout_notice = format!(
            "Execution timed out after {} seconds",
            limits.timeout.as_secs()
        );

        let (status, exit_code, stderr) = match output.exit {
            ProcessExit::Exited(0) => (ExecutionStatus::Success, Some(0), output.stderr),
            ProcessExit::Exited(code) => (ExecutionStatus::RuntimeError, Some(code), output.stderr),
            ProcessExit::TimedOut => (
                ExecutionStatus::Timeout,
                None,
                with_notice(output.stderr, &timeout_notice),
            ),
            // SIGXCPU means the CPU rlimit, derived from the timeout, ran out.
            ProcessExit::Signaled(signal) if signal == Signal::SIGXCPU as i32 => (
                ExecutionStatus::Timeout,
                None,
                with_notice(output.stderr, &timeout_notice),
            ),
            ProcessExit::Signaled(signal) => (
                ExecutionStatus::RuntimeError,
                None,
                with_notice(
                    output.stderr,
                    &format!("Process terminated by signal {}", signal),
                ),
            ),
        };

        Ok(ExecutionResult {
            status,
            language: Some(profile.id.to_string()),
            stdout: output.stdout,
            stderr,
            exit_code,
            execution_time: output.elapsed,
        })
    }
}

/// Host values for the configured variable names. Children get a fresh
/// `HOME`, so rustup proxies are pointed at the host's toolchains directly.
fn toolchain_env(names: &[String]) -> Vec<(OsString, OsString)> {
    let mut vars: Vec<_> = names
        .iter()
        .filter_map(|name| env::var_os(name).map(|value| (OsString::from(name), value)))
        .collect();

    if !vars.iter().any(|(name, _)| name == "RUSTUP_HOME") {
        let rustup_home = env::var_os("HOME").map(|home| Path::new(&home).join(".rustup"));
        if let Some(rustup_home) = rustup_home.filter(|dir| dir.is_dir()) {
            vars.push(("RUSTUP_HOME".into(), rustup_home.into_os_string()));
        }
    }
    vars
}

fn invocation(
    profile: &LanguageProfile,
    template: &[&str],
    placeholders: &Placeholders,
) -> Result<Invocation> {
    Invocation::from_template(template, placeholders).ok_or_else(|| {
        Error::System(format!(
            "Language profile '{}' has an empty command template",
            profile.id
        ))
    })
}

fn internal_error(profile: &LanguageProfile, e: Error, started: Instant) -> ExecutionResult {
    error!(language = profile.id, "Code execution failed: {}", e);
    ExecutionResult::failure(
        ExecutionStatus::InternalError,
        Some(profile.id),
        e.to_string(),
        started.elapsed(),
    )
}

fn with_notice(mut stderr: String, notice: &str) -> String {
    if !stderr.is_empty() && !stderr.ends_with('\n') {
        stderr.push('\n');
    }
    stderr.push_str(notice);
    stderr
}
