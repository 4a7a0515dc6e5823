use super::utils::processes::wait_until_gone;
use crate::{
    config::{FILE_SIZE_LIMIT, OUTPUT_LIMIT},
    languages::Invocation,
    sandbox::{ProcessExit, ProcessLimits, Sandbox, STDOUT_TRUNCATED},
    Error, Result,
};
use assert_fs::TempDir;
use std::ffi::OsString;
use tokio::time::Duration;

fn command(program: &str, args: &[&str]) -> Invocation {
    Invocation {
        program: OsString::from(program),
        args: args.iter().map(OsString::from).collect(),
    }
}

fn limits(timeout: Duration) -> ProcessLimits {
    ProcessLimits {
        timeout,
        output_limit: OUTPUT_LIMIT,
        memory: None,
        file_size: FILE_SIZE_LIMIT,
    }
}

#[tokio::test]
async fn test_sandbox_basic() -> Result<()> {
    let sandbox = Sandbox::new(None).await?;
    let output = sandbox
        .execute(&command("echo", &["Hello"]), None, &limits(Duration::from_secs(5)))
        .await?;
    assert_eq!(output.exit, ProcessExit::Exited(0));
    assert_eq!(output.stdout.trim(), "Hello");
    assert!(output.stderr.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_sandbox_input() -> Result<()> {
    let sandbox = Sandbox::new(None).await?;
    let output = sandbox
        .execute(
            &command("cat", &[]),
            Some("test input"),
            &limits(Duration::from_secs(5)),
        )
        .await?;
    assert_eq!(output.stdout, "test input");
    assert!(output.stderr.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_sandbox_without_input_sees_eof() -> Result<()> {
    let sandbox = Sandbox::new(None).await?;
    let output = sandbox
        .execute(&command("cat", &[]), None, &limits(Duration::from_secs(5)))
        .await?;
    assert_eq!(output.exit, ProcessExit::Exited(0));
    assert!(output.stdout.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_sandbox_timeout() -> Result<()> {
    let sandbox = Sandbox::new(None).await?;
    let output = sandbox
        .execute(&command("sleep", &["10"]), None, &limits(Duration::from_secs(1)))
        .await?;
    assert_eq!(output.exit, ProcessExit::TimedOut);
    assert!(output.elapsed < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn test_sandbox_kills_background_children_on_timeout() -> Result<()> {
    let sandbox = Sandbox::new(None).await?;
    let output = sandbox
        .execute(
            &command("sh", &["-c", "sleep 30 & echo $!; wait"]),
            None,
            &limits(Duration::from_secs(1)),
        )
        .await?;
    assert_eq!(output.exit, ProcessExit::TimedOut);

    let orphan: i32 = output.stdout.trim().parse().expect("background pid");
    assert!(wait_until_gone(orphan, Duration::from_secs(3)).await);
    Ok(())
}

#[tokio::test]
async fn test_sandbox_kills_leftovers_after_exit() -> Result<()> {
    let sandbox = Sandbox::new(None).await?;
    let output = sandbox
        .execute(
            &command("sh", &["-c", "sleep 30 >/dev/null 2>&1 & echo $!"]),
            None,
            &limits(Duration::from_secs(5)),
        )
        .await?;
    assert_eq!(output.exit, ProcessExit::Exited(0));

    let orphan: i32 = output.stdout.trim().parse().expect("background pid");
    assert!(wait_until_gone(orphan, Duration::from_secs(3)).await);
    Ok(())
}

#[tokio::test]
async fn test_sandbox_truncates_output() -> Result<()> {
    let sandbox = Sandbox::new(None).await?;
    let limits = ProcessLimits {
        output_limit: 1000,
        ..limits(Duration::from_secs(5))
    };
    let output = sandbox
        .execute(&command("sh", &["-c", "yes | head -c 100000"]), None, &limits)
        .await?;
    assert_eq!(output.exit, ProcessExit::Exited(0));
    assert!(output.stdout.ends_with(STDOUT_TRUNCATED));
    assert_eq!(output.stdout.len(), 1000 + STDOUT_TRUNCATED.len());
    Ok(())
}

#[tokio::test]
async fn test_sandbox_environment_is_cleared() -> Result<()> {
    let sandbox = Sandbox::new(None).await?;
    let output = sandbox
        .execute(&command("env", &[]), None, &limits(Duration::from_secs(5)))
        .await?;

    let allowed = ["PATH", "HOME", "TMPDIR", "LANG"];
    for line in output.stdout.lines() {
        let key = line.split('=').next().unwrap_or_default();
        assert!(allowed.contains(&key), "unexpected variable {}", key);
    }
    let home = format!("HOME={}", sandbox.root_dir().display());
    assert!(output.stdout.lines().any(|line| line == home));
    Ok(())
}

#[tokio::test]
async fn test_sandbox_file_size_limit() -> Result<()> {
    let sandbox = Sandbox::new(None).await?;
    let limits = ProcessLimits {
        file_size: 1024,
        ..limits(Duration::from_secs(5))
    };
    let output = sandbox
        .execute(
            &command("sh", &["-c", "head -c 65536 /dev/zero > big.bin"]),
            None,
            &limits,
        )
        .await?;
    assert_ne!(output.exit, ProcessExit::Exited(0));

    let written = std::fs::metadata(sandbox.root_dir().join("big.bin"))?.len();
    assert!(written <= 1024);
    Ok(())
}

#[tokio::test]
async fn test_sandbox_missing_command() -> Result<()> {
    let sandbox = Sandbox::new(None).await?;
    let result = sandbox
        .execute(
            &command("definitely-not-an-installed-tool", &[]),
            None,
            &limits(Duration::from_secs(5)),
        )
        .await;
    assert!(matches!(result, Err(Error::System(msg)) if msg.contains("Command not found")));
    Ok(())
}

#[tokio::test]
async fn test_sandbox_filesystem_failures_are_io_errors() -> Result<()> {
    let base = TempDir::new().unwrap();

    let missing = base.path().join("does-not-exist");
    let result = Sandbox::new(Some(&missing)).await;
    assert!(matches!(result, Err(Error::Io(_))));

    let sandbox = Sandbox::new(Some(base.path())).await?;
    let result = sandbox.write_source("no-such-dir/main.py", "print(1)").await;
    assert!(matches!(result, Err(Error::Io(_))));
    Ok(())
}

#[tokio::test]
async fn test_sandbox_directory_is_removed() -> Result<()> {
    let base = TempDir::new().unwrap();

    let sandbox = Sandbox::new(Some(base.path())).await?;
    let root = sandbox.root_dir().to_path_buf();
    assert!(root.starts_with(base.path()));
    sandbox.write_source("notes.txt", "scratch").await?;
    sandbox.close()?;
    assert!(!root.exists());

    // Dropping without closing cleans up too.
    let sandbox = Sandbox::new(Some(base.path())).await?;
    let root = sandbox.root_dir().to_path_buf();
    drop(sandbox);
    assert!(!root.exists());

    assert_eq!(std::fs::read_dir(base.path())?.count(), 0);
    Ok(())
}
