use nix::errno::Errno;
use nix::sys::resource::{setrlimit, Resource};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{setpgid, Pid};
use std::ffi::OsString;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tempfile::TempDir;
use tokio::{
    fs,
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::Command,
    task::JoinHandle,
    time::{self, Duration},
};
use tracing::{debug, warn};

use crate::{error::Error, languages::Invocation, Result};

pub const STDOUT_TRUNCATED: &str = "\n[Output truncated - too large]";
pub const STDERR_TRUNCATED: &str = "\n[Error output truncated - too large]";

/// Search path handed to children, after the resolved tool's own directory.
const BASE_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// How long to keep draining pipes once the process group is gone. Only a
/// descendant that escaped the group can hold a pipe open past this.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Limits for a single process spawned in the sandbox.
#[derive(Debug, Clone)]
pub struct ProcessLimits {
    /// Wall-clock limit; the CPU rlimit is derived from it
    pub timeout: Duration,
    /// Bytes kept per output stream
    pub output_limit: usize,
    /// Address-space rlimit, when the runtime tolerates one
    pub memory: Option<u64>,
    /// Largest file the process may write
    pub file_size: u64,
}

/// How a sandboxed process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    Exited(i32),
    Signaled(i32),
    TimedOut,
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        status
            .code()
            .map(ProcessExit::Exited)
            .or_else(|| status.signal().map(ProcessExit::Signaled))
            .unwrap_or(ProcessExit::Exited(-1))
    }
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub exit: ProcessExit,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Per-call working directory. Everything written during the call lives
/// under it and is removed when the sandbox is closed or dropped.
///
/// There is no privilege drop, namespace or syscall filter here: children
/// run with the server's own rights, bounded only by rlimits, the timeout
/// and the process-group kill.
pub struct Sandbox {
    dir: TempDir,
    /// Extra variables set after the environment is cleared
    env: Vec<(OsString, OsString)>,
}

impl Sandbox {
    /// Creates a fresh, uniquely named directory under `base`, or under the
    /// system temporary directory when `base` is `None`.
    pub async fn new(base: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("code-exec-");
        let dir = match base {
            Some(base) => builder.tempdir_in(base),
            None => builder.tempdir(),
        }?;

        fs::create_dir(dir.path().join("tmp")).await?;

        debug!("Created sandbox at {}", dir.path().display());
        Ok(Self {
            dir,
            env: Vec::new(),
        })
    }

    /// Adds variables to every child's environment. `PATH`, `HOME` and
    /// `TMPDIR` are always the sandbox's own.
    pub fn with_env(mut self, vars: Vec<(OsString, OsString)>) -> Self {
        self.env = vars;
        self
    }

    pub fn root_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Writes source text into the sandbox and returns its path.
    pub async fn write_source(&self, file_name: &str, code: &str) -> Result<PathBuf> {
        let path = self.root_dir().join(file_name);
        fs::write(&path, code).await?;
        Ok(path)
    }

    /// Removes the directory, reporting failures that `Drop` would swallow.
    pub fn close(self) -> Result<()> {
        Ok(self.dir.close()?)
    }

    /// Runs one process to completion or until its timeout.
    ///
    /// The child gets its own process group. When it exits, times out, or
    /// this future is dropped, the whole group is killed so no descendant
    /// outlives the call.
    pub async fn execute(
        &self,
        invocation: &Invocation,
        input: Option<&str>,
        limits: &ProcessLimits,
    ) -> Result<ProcessOutput> {
        let started = Instant::now();
        let program = self.resolve_program(invocation)?;
        let search_path = match program.parent() {
            Some(dir) if !invocation.is_path() => format!("{}:{}", dir.display(), BASE_PATH),
            _ => BASE_PATH.to_string(),
        };

        debug!("Sandbox execute - Command: {}", program.display());
        debug!("Sandbox execute - Args: {:?}", invocation.args);
        debug!("Sandbox execute - Root dir: {:?}", self.root_dir());

        let mut command = Command::new(&program);
        command
            .args(&invocation.args)
            .env_clear()
            .envs(self.env.iter().map(|(key, value)| (key, value)))
            .env("PATH", search_path)
            .env("HOME", self.root_dir())
            .env("TMPDIR", self.root_dir().join("tmp"))
            .env("LANG", "C.UTF-8")
            .current_dir(self.root_dir())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        // Copies for the pre_exec closure, which runs in the forked child.
        let cpu_time = limits.timeout.as_secs() + 1;
        let file_size = limits.file_size;
        let memory = limits.memory;

        unsafe {
            command.pre_exec(move || {
                setpgid(Pid::from_raw(0), Pid::from_raw(0))?;
                setrlimit(Resource::RLIMIT_CPU, cpu_time, cpu_time + 1)?;
                setrlimit(Resource::RLIMIT_FSIZE, file_size, file_size)?;
                setrlimit(Resource::RLIMIT_CORE, 0, 0)?;

                #[cfg(target_os = "linux")]
                if let Some(bytes) = memory {
                    setrlimit(Resource::RLIMIT_AS, bytes, bytes)?;
                }
                #[cfg(not(target_os = "linux"))]
                let _ = memory;

                Ok(())
            });
        }

        let mut child = command
            .spawn()
            .map_err(|e| Error::System(format!("Failed to spawn {}: {}", program.display(), e)))?;
        let mut group = ProcessGroup::new(child.id());

        let stdin_writer = match (child.stdin.take(), input) {
            (Some(mut pipe), Some(input)) => {
                let input = input.to_owned();
                Some(tokio::spawn(async move {
                    // A program that never reads stdin closes the pipe early.
                    if let Err(e) = pipe.write_all(input.as_bytes()).await {
                        debug!("Stopped writing stdin: {}", e);
                    }
                }))
            }
            _ => None,
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::System("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::System("stderr was not captured".to_string()))?;
        let stdout = CappedStream::spawn(stdout, limits.output_limit);
        let stderr = CappedStream::spawn(stderr, limits.output_limit);

        let exit = match time::timeout(limits.timeout, child.wait()).await {
            Ok(Ok(status)) => ProcessExit::from(status),
            Ok(Err(e)) => return Err(Error::System(format!("Process error: {}", e))),
            Err(_) => {
                warn!(
                    pid = ?child.id(),
                    "Process exceeded {:?}, killing its process group",
                    limits.timeout
                );
                group.kill();
                match time::timeout(DRAIN_GRACE, child.wait()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!("Failed to reap timed out process: {}", e),
                    Err(_) => warn!("Timed out process did not exit after SIGKILL"),
                }
                ProcessExit::TimedOut
            }
        };

        // Descendants left behind by a finished leader go too.
        group.release();

        if let Some(writer) = stdin_writer {
            writer.abort();
        }

        Ok(ProcessOutput {
            exit,
            stdout: stdout.finish(STDOUT_TRUNCATED).await,
            stderr: stderr.finish(STDERR_TRUNCATED).await,
            elapsed: started.elapsed(),
        })
    }

    fn resolve_program(&self, invocation: &Invocation) -> Result<PathBuf> {
        if invocation.is_path() {
            return Ok(PathBuf::from(&invocation.program));
        }
        which::which(&invocation.program).map_err(|_| {
            Error::System(format!(
                "Command not found: {}",
                invocation.program.to_string_lossy()
            ))
        })
    }
}

/// Kills a process group on demand and, unless released, on drop.
struct ProcessGroup {
    pgid: Option<Pid>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self {
            pgid: leader
                .and_then(|id| i32::try_from(id).ok())
                .map(Pid::from_raw),
        }
    }

    fn kill(&self) {
        let Some(pgid) = self.pgid else {
            return;
        };
        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!(pgid = pgid.as_raw(), "Failed to kill process group: {}", e),
        }
    }

    /// Kills whatever is left of the group and forgets it.
    fn release(&mut self) {
        self.kill();
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Bytes kept from one output stream.
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Captured {
    fn push(&mut self, chunk: &[u8], limit: usize) {
        let room = limit.saturating_sub(self.bytes.len());
        let take = room.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..take]);
        if take < chunk.len() {
            self.truncated = true;
        }
    }

    fn into_string(self, marker: &str) -> String {
        let mut bytes = self.bytes.as_slice();
        if self.truncated {
            // Don't leave half a character at the cut.
            if let Err(e) = std::str::from_utf8(bytes) {
                if e.error_len().is_none() {
                    bytes = &bytes[..e.valid_up_to()];
                }
            }
        }
        let mut text = String::from_utf8_lossy(bytes).into_owned();
        if self.truncated {
            text.push_str(marker);
        }
        text
    }
}

/// Drains a pipe in the background, keeping at most `limit` bytes and
/// discarding the rest so the child never blocks on a full pipe.
struct CappedStream {
    buffer: Arc<Mutex<Captured>>,
    reader: JoinHandle<()>,
}

impl CappedStream {
    fn spawn<R>(mut pipe: R, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Captured::default()));
        let sink = buffer.clone();
        let reader = tokio::spawn(async move {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(&chunk[..n], limit),
                    Err(e) => {
                        debug!("Stopped reading output: {}", e);
                        break;
                    }
                }
            }
        });
        Self { buffer, reader }
    }

    /// Waits briefly for EOF, then returns whatever was captured.
    async fn finish(mut self, marker: &str) -> String {
        if time::timeout(DRAIN_GRACE, &mut self.reader).await.is_err() {
            warn!("Output pipe still open after the process group was killed");
            self.reader.abort();
        }
        let captured = std::mem::take(
            &mut *self
                .buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        captured.into_string(marker)
    }
}
