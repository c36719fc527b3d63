/// External command execution for cluster tooling (crictl, oc)
use crate::error::ExecError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;

/// Execution result from an external command
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Exit code (-1 when terminated by a signal)
    pub exit_code: i32,

    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last non-empty stderr line, for error messages
    pub fn last_error_line(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("No output available")
    }
}

/// Runs a program and captures its output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<ExecResult, ExecError>;
}

/// Runs commands with `tokio::process`, killing them after `timeout`
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ExecResult, ExecError> {
        tracing::debug!("[exec] {} {}", program, args.join(" "));
        let start = std::time::Instant::now();

        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ExecError::Wait {
                program: program.to_string(),
                source,
            })?,
            Err(_) => {
                return Err(ExecError::Timeout {
                    program: program.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        };

        let result = ExecResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(
            "[exec] {} exited {} in {}ms",
            program,
            result.exit_code,
            start.elapsed().as_millis()
        );
        Ok(result)
    }
}
