//! In-process fakes for the executor seam (testing only)
//!
//! `ScriptedExecutor` answers every invocation from a table keyed by program
//! name instead of spawning processes, and records what it was asked to run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::cancel::CancelToken;
use crate::error::ExecError;
use crate::exec::{CommandExecutor, ExitInfo};
use crate::step::Invocation;

#[derive(Debug, Clone, Copy)]
enum Script {
    Exit(i32),
    Unspawnable,
    Cancelled,
    TimedOut,
}

/// Executor whose results are scripted per program. Unscripted programs exit 0.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<String, Script>,
    outputs: HashMap<String, (PathBuf, String)>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `program` exits with `code`.
    pub fn exit(mut self, program: &str, code: i32) -> Self {
        self.scripts.insert(program.to_string(), Script::Exit(code));
        self
    }

    /// `program` cannot be started.
    pub fn unspawnable(mut self, program: &str) -> Self {
        self.scripts.insert(program.to_string(), Script::Unspawnable);
        self
    }

    /// `program` is interrupted by cancellation.
    pub fn cancelled(mut self, program: &str) -> Self {
        self.scripts.insert(program.to_string(), Script::Cancelled);
        self
    }

    /// `program` exceeds its timeout.
    pub fn timed_out(mut self, program: &str) -> Self {
        self.scripts.insert(program.to_string(), Script::TimedOut);
        self
    }

    /// `program` writes `contents` to `path` (relative to its cwd) when it
    /// runs, the way a test runner writes its coverage report.
    pub fn writes(mut self, program: &str, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.outputs
            .insert(program.to_string(), (path.into(), contents.to_string()));
        self
    }

    /// Every invocation seen so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Programs invoked so far, in order.
    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|inv| inv.program).collect()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<ExitInfo, ExecError> {
        self.calls.lock().unwrap().push(invocation.clone());

        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled);
        }

        if let Some((path, contents)) = self.outputs.get(&invocation.program) {
            let path = match &invocation.cwd {
                Some(cwd) if path.is_relative() => cwd.join(path),
                _ => path.clone(),
            };
            std::fs::write(&path, contents).map_err(|source| ExecError::Wait {
                program: invocation.program.clone(),
                source,
            })?;
        }

        let script = self
            .scripts
            .get(&invocation.program)
            .copied()
            .unwrap_or(Script::Exit(0));

        match script {
            Script::Exit(code) => Ok(ExitInfo {
                code: Some(code),
                success: code == 0,
                duration_ms: 1,
            }),
            Script::Unspawnable => Err(ExecError::Spawn {
                program: invocation.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
            Script::Cancelled => {
                cancel.cancel();
                Err(ExecError::Cancelled)
            }
            Script::TimedOut => Err(ExecError::TimedOut(timeout.unwrap_or_default())),
        }
    }
}
