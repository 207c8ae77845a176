//! Secondary validator invocation.
//!
//! The delegate is another, independently versioned pipeline for a separate
//! part of the codebase. It runs as one process and only its terminal
//! success or failure is observed.

use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::runner::{RunOutcome, StepRunner};
use crate::step::Invocation;

/// Runs the delegate validator as a single opaque step.
///
/// Same isolation guarantee as [`StepRunner`]: `execute` never errors.
#[derive(Clone)]
pub struct DelegateInvoker {
    runner: StepRunner,
}

impl DelegateInvoker {
    pub fn new(runner: StepRunner) -> Self {
        Self { runner }
    }

    pub async fn execute(&self, invocation: &Invocation, cancel: &CancelToken) -> RunOutcome {
        info!(
            command = %invocation.command_line(),
            dir = ?invocation.cwd,
            "Handing off to delegate validator"
        );

        let mut outcome = self.runner.execute(invocation, cancel).await;
        if !outcome.passed && !outcome.cancelled {
            let reason = outcome.detail.take().unwrap_or_default();
            warn!(reason = %reason, "Delegate validator reported failure");
            outcome.detail = Some(format!("delegate validator failed: {}", reason));
        }
        outcome
    }
}
