//! Process execution seam.
//!
//! The step runner only ever sees [`CommandExecutor`]; [`ProcessExecutor`] is
//! the real implementation on top of `tokio::process`.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::ExecError;
use crate::step::Invocation;

/// How often a running child checks for cancellation and its deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal state of a finished process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,

    pub success: bool,

    pub duration_ms: u64,
}

/// Runs one external command to completion.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `invocation`, killing it when `timeout` elapses or `cancel` fires.
    async fn run(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<ExitInfo, ExecError>;
}

/// Executor that spawns real child processes.
///
/// Child stdout/stderr are inherited so tool output reaches the console
/// unmodified.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn run(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<ExitInfo, ExecError> {
        let start = Instant::now();

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| ExecError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;
        debug!(program = %invocation.program, pid = ?child.id(), "Spawned process");

        // A timeout too large for `Instant` to represent means no deadline.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t).map(|at| (at, t)));

        loop {
            tokio::select! {
                status = child.wait() => {
                    let status = status.map_err(|source| ExecError::Wait {
                        program: invocation.program.clone(),
                        source,
                    })?;
                    return Ok(ExitInfo {
                        code: status.code(),
                        success: status.success(),
                        duration_ms: start.elapsed().as_millis() as u64,
                    });
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    if cancel.is_cancelled() {
                        let _ = child.kill().await;
                        return Err(ExecError::Cancelled);
                    }
                    if let Some((at, limit)) = deadline {
                        if Instant::now() >= at {
                            let _ = child.kill().await;
                            return Err(ExecError::TimedOut(limit));
                        }
                    }
                }
            }
        }
    }
}
