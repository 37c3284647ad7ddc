//! Delegated command execution.
//!
//! The SSH and HDFS backends move bytes by running external tools (`scp`,
//! `ssh`, `hdfs`). They do so through the `CommandRunner` trait so the
//! command lines they build can be exercised without the tools installed.

use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// Stderr if it has content, otherwise a description of the exit status.
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.status_code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs external programs on behalf of a backend.
pub trait CommandRunner {
    /// Run to completion, capturing output.
    ///
    /// A spawn failure of kind `NotFound` means the program is not installed.
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;

    /// Run with a deadline. Returns `Ok(None)` if the deadline expired; the
    /// child is killed in that case.
    fn run_with_timeout(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> io::Result<Option<CommandOutput>>;
}

/// Runs commands with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        debug!(program, ?args, "running command");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        Ok(CommandOutput {
            status_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn run_with_timeout(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> io::Result<Option<CommandOutput>> {
        debug!(program, ?args, ?timeout, "running command with deadline");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        };

        // Pipes are drained after exit: only short-output commands belong here.
        let mut stdout = String::new();
        let mut stderr = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout)?;
        }
        if let Some(mut err) = child.stderr.take() {
            err.read_to_string(&mut stderr)?;
        }

        Ok(Some(CommandOutput {
            status_code: status.code(),
            stdout,
            stderr,
        }))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_detail_prefers_stderr() {
        let output = CommandOutput {
            status_code: Some(1),
            stdout: String::new(),
            stderr: "  permission denied\n".to_string(),
        };
        assert!(!output.success());
        assert_eq!(output.failure_detail(), "permission denied");

        let output = CommandOutput {
            status_code: Some(3),
            ..Default::default()
        };
        assert_eq!(output.failure_detail(), "exited with status 3");
    }

    #[test]
    fn test_missing_program_is_not_found() {
        let err = SystemRunner
            .run("copyway-definitely-missing-tool", &[])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_output() {
        let output = SystemRunner
            .run("sh", &["-c".to_string(), "echo ok; exit 0".to_string()])
            .expect("sh should run");
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "ok");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_with_timeout_expires() {
        let result = SystemRunner
            .run_with_timeout(
                "sh",
                &["-c".to_string(), "sleep 5".to_string()],
                Duration::from_millis(200),
            )
            .expect("sh should spawn");
        assert!(result.is_none());
    }
}
