//! Bounded subprocess execution.
//!
//! Every external program the loop touches (patch tools, linters, test
//! runners) goes through [`run_command`]. A missing executable or a timeout
//! is reported as data with a reserved exit code, never as an error.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::domain::{NOT_FOUND_EXIT_CODE, TIMEOUT_EXIT_CODE};

/// Captured result of one subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
    pub not_found: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out && !self.not_found
    }
}

/// Run `program args..` in `cwd` with stdin closed, killing it after `timeout`.
///
/// A zero timeout means "no limit".
pub async fn run_command(
    program: &str,
    args: &[String],
    cwd: &Path,
    timeout: Duration,
) -> CommandOutput {
    let start = Instant::now();

    let child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return CommandOutput {
                exit_code: NOT_FOUND_EXIT_CODE,
                stdout: String::new(),
                stderr: format!("{program} not found"),
                duration_ms: start.elapsed().as_millis() as u64,
                timed_out: false,
                not_found: true,
            };
        }
        Err(e) => {
            return CommandOutput {
                exit_code: -1,
                stdout: String::new(),
                stderr: format!("failed to spawn {program}: {e}"),
                duration_ms: start.elapsed().as_millis() as u64,
                timed_out: false,
                not_found: false,
            };
        }
    };

    let waited = if timeout.is_zero() {
        Ok(child.wait_with_output().await)
    } else {
        tokio::time::timeout(timeout, child.wait_with_output()).await
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    match waited {
        Ok(Ok(output)) => {
            let exit_code = output.status.code().unwrap_or(-1);
            debug!(program, exit_code, duration_ms, "command finished");
            CommandOutput {
                exit_code,
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                duration_ms,
                timed_out: false,
                not_found: false,
            }
        }
        Ok(Err(e)) => CommandOutput {
            exit_code: -1,
            stdout: String::new(),
            stderr: format!("{program} failed: {e}"),
            duration_ms,
            timed_out: false,
            not_found: false,
        },
        // The child is dropped with the timed-out future and killed.
        Err(_elapsed) => CommandOutput {
            exit_code: TIMEOUT_EXIT_CODE,
            stdout: String::new(),
            stderr: format!("{program} timed out after {}s", timeout.as_secs()),
            duration_ms,
            timed_out: true,
            not_found: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_simple_command() {
        let out = run_command(
            "echo",
            &["hello".to_string()],
            Path::new("."),
            Duration::from_secs(10),
        )
        .await;
        assert!(out.success());
        assert!(out.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_missing_program_is_reported_not_raised() {
        let out = run_command(
            "definitely-not-a-real-binary-4242",
            &[],
            Path::new("."),
            Duration::from_secs(5),
        )
        .await;
        assert!(out.not_found);
        assert_eq!(out.exit_code, NOT_FOUND_EXIT_CODE);
        assert!(!out.success());
    }

    #[tokio::test]
    async fn test_timeout_is_reported_not_raised() {
        let out = run_command(
            "sleep",
            &["5".to_string()],
            Path::new("."),
            Duration::from_millis(100),
        )
        .await;
        assert!(out.timed_out);
        assert_eq!(out.exit_code, TIMEOUT_EXIT_CODE);
    }

    #[tokio::test]
    async fn test_failing_command() {
        let out = run_command("false", &[], Path::new("."), Duration::from_secs(5)).await;
        assert!(!out.success());
        assert_ne!(out.exit_code, 0);
    }
}
