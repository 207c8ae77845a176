//! Step execution with failure isolation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::coverage;
use crate::error::ExecError;
use crate::exec::CommandExecutor;
use crate::step::{Invocation, SuccessPredicate};

/// Outcome of running one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Whether the invocation's success predicate held.
    pub passed: bool,

    /// Process exit code, when the process ran to completion.
    pub exit_code: Option<i32>,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Diagnostic for a failure.
    pub detail: Option<String>,

    /// Execution was interrupted by cancellation.
    pub cancelled: bool,
}

impl RunOutcome {
    fn failed(detail: impl Into<String>, exit_code: Option<i32>, duration_ms: u64) -> Self {
        Self {
            passed: false,
            exit_code,
            duration_ms,
            detail: Some(detail.into()),
            cancelled: false,
        }
    }
}

/// Runs one invocation and maps its terminal state to pass/fail.
///
/// `execute` never returns an error: spawn failures, timeouts, cancellation
/// and unreadable coverage reports all become a failed outcome with a
/// diagnostic, so the next step always gets to run.
#[derive(Clone)]
pub struct StepRunner {
    executor: Arc<dyn CommandExecutor>,
    timeout: Option<Duration>,
}

impl StepRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            timeout: None,
        }
    }

    /// Kill any step still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Execute a single invocation and return the outcome.
    pub async fn execute(&self, invocation: &Invocation, cancel: &CancelToken) -> RunOutcome {
        debug!(command = %invocation.command_line(), "Executing invocation");

        if let SuccessPredicate::CoverageAtLeast { report, .. } = &invocation.success {
            let report = resolve_report(invocation, report);
            if let Err(e) = coverage::clear_report(&report) {
                warn!(report = ?report, error = %e, "Could not clear previous coverage report");
                return RunOutcome::failed(e.to_string(), None, 0);
            }
        }

        let info = match self.executor.run(invocation, self.timeout, cancel).await {
            Ok(info) => info,
            Err(ExecError::Cancelled) => {
                return RunOutcome {
                    cancelled: true,
                    ..RunOutcome::failed("cancelled", None, 0)
                };
            }
            Err(e) => {
                warn!(command = %invocation.command_line(), error = %e, "Step execution error");
                return RunOutcome::failed(e.to_string(), None, 0);
            }
        };

        if !info.success {
            let detail = match info.code {
                Some(code) => format!("exited with code {}", code),
                None => "terminated by signal".to_string(),
            };
            return RunOutcome::failed(detail, info.code, info.duration_ms);
        }

        match &invocation.success {
            SuccessPredicate::ExitZero => RunOutcome {
                passed: true,
                exit_code: info.code,
                duration_ms: info.duration_ms,
                detail: None,
                cancelled: false,
            },
            SuccessPredicate::CoverageAtLeast { report, threshold } => {
                let report = resolve_report(invocation, report);
                match coverage::check_threshold(&report, *threshold) {
                    Ok(pct) => RunOutcome {
                        passed: true,
                        exit_code: info.code,
                        duration_ms: info.duration_ms,
                        detail: Some(format!("coverage {:.2}%", pct)),
                        cancelled: false,
                    },
                    Err(e) => {
                        warn!(report = ?report, error = %e, "Coverage gate failed");
                        RunOutcome::failed(e.to_string(), info.code, info.duration_ms)
                    }
                }
            }
        }
    }
}

/// Relative report paths are relative to the invocation's working directory.
fn resolve_report(invocation: &Invocation, report: &Path) -> PathBuf {
    match &invocation.cwd {
        Some(cwd) if report.is_relative() => cwd.join(report),
        _ => report.to_path_buf(),
    }
}
