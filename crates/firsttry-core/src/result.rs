//! Per-step outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::step::{Severity, StepKind};

/// Terminal status of a step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,

    /// The required capability was not reachable; no process was started.
    CapabilityMissing,
}

impl StepStatus {
    /// Label used in the summary table.
    pub fn label(&self) -> &'static str {
        match self {
            StepStatus::Passed => "PASS",
            StepStatus::Failed => "FAIL",
            StepStatus::CapabilityMissing => "MISSING",
        }
    }
}

/// Failure taxonomy used in reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An advisory (provisioning) step failed; never blocks.
    Provisioning,

    /// A required tool was not reachable.
    CapabilityMissing,

    /// A command returned failure, could not start, or timed out.
    StepExecution,

    /// The delegate validator reported failure.
    Delegate,
}

impl FailureKind {
    /// Taxonomy of an outcome; `None` when it passed.
    pub fn classify(status: StepStatus, severity: Severity, kind: StepKind) -> Option<Self> {
        match (status, severity, kind) {
            (StepStatus::Passed, _, _) => None,
            (StepStatus::CapabilityMissing, _, _) => Some(FailureKind::CapabilityMissing),
            (StepStatus::Failed, Severity::Advisory, _) => Some(FailureKind::Provisioning),
            (StepStatus::Failed, Severity::Fatal, StepKind::Delegate) => Some(FailureKind::Delegate),
            (StepStatus::Failed, Severity::Fatal, StepKind::Command) => {
                Some(FailureKind::StepExecution)
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Provisioning => "provisioning",
            FailureKind::CapabilityMissing => "capability missing",
            FailureKind::StepExecution => "step execution",
            FailureKind::Delegate => "delegate",
        }
    }
}

/// Result of one step, created once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    /// Step name.
    pub step_name: String,

    /// Position in the declared plan, starting at 0.
    pub index: usize,

    pub severity: Severity,

    pub kind: StepKind,

    pub status: StepStatus,

    /// Why the step did not pass, when it did not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    /// Command line that was (or would have been) run.
    pub command: String,

    /// Exit code, when a process ran to completion.
    pub exit_code: Option<i32>,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Diagnostic for non-passing steps.
    pub detail: Option<String>,

    pub started_at: DateTime<Utc>,
}

impl StepResult {
    /// Whether this step passed.
    pub fn passed(&self) -> bool {
        self.status == StepStatus::Passed
    }

    /// Whether this outcome blocks the gate.
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Fatal && !self.passed()
    }
}

#[cfg(test)]
pub(crate) fn sample(name: &str, severity: Severity, status: StepStatus) -> StepResult {
    StepResult {
        step_name: name.to_string(),
        index: 0,
        severity,
        kind: StepKind::Command,
        status,
        failure_kind: FailureKind::classify(status, severity, StepKind::Command),
        command: name.to_string(),
        exit_code: None,
        duration_ms: 0,
        detail: None,
        started_at: Utc::now(),
    }
}
