use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Code execution request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Language identifier or alias, e.g. `python` or `c++`
    pub language: String,
    /// Source code to execute
    pub code: String,
    /// Data fed to the program's standard input
    #[serde(default)]
    pub stdin: Option<String>,
    /// Run timeout override, clamped to the engine's hard ceiling
    #[serde(default, with = "duration_serde::option")]
    pub timeout: Option<Duration>,
    /// Address-space limit override in bytes, clamped to the engine's ceiling
    #[serde(default)]
    pub memory_limit: Option<u64>,
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }
}

/// Outcome of one execution. Exactly one variant holds per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    UnsupportedLanguage,
    CompileError,
    RuntimeError,
    Timeout,
    InternalError,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::UnsupportedLanguage => "unsupported_language",
            ExecutionStatus::CompileError => "compile_error",
            ExecutionStatus::RuntimeError => "runtime_error",
            ExecutionStatus::Timeout => "timeout",
            ExecutionStatus::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Execution status
    pub status: ExecutionStatus,
    /// Canonical identifier of the language that ran, when it was recognised
    pub language: Option<String>,
    /// Program output (stdout), capped
    pub stdout: String,
    /// Program errors (stderr), capped; compiler diagnostics on compile errors
    pub stderr: String,
    /// Exit code of the last process that ran. `None` when it was killed by
    /// a signal or never started.
    pub exit_code: Option<i32>,
    /// Wall-clock time spent in the call
    #[serde(with = "duration_serde")]
    pub execution_time: Duration,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Failure tag, `None` for a clean success.
    pub fn classification(&self) -> Option<ExecutionStatus> {
        match self.status {
            ExecutionStatus::Success => None,
            other => Some(other),
        }
    }

    pub(crate) fn failure(
        status: ExecutionStatus,
        language: Option<&str>,
        message: String,
        execution_time: Duration,
    ) -> Self {
        Self {
            status,
            language: language.map(str::to_string),
            stdout: String::new(),
            stderr: message,
            exit_code: None,
            execution_time,
        }
    }
}

/// Serializes durations as fractional seconds with millisecond precision.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64((duration.as_millis() as f64) / 1000.0)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<f64>::deserialize(deserializer)?
                .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
