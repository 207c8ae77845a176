//! Failure aggregation into one verdict.

use serde::{Deserialize, Serialize};

use crate::exit_codes;
use crate::result::StepResult;

/// The single pass/fail decision for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateVerdict {
    /// Whether any fatal step failed or lacked its capability.
    pub failed: bool,

    /// Fatal steps that did not pass, in declaration order.
    pub failing_steps: Vec<String>,

    /// Advisory steps that did not pass. Informational only.
    pub advisory_failures: Vec<String>,
}

impl AggregateVerdict {
    pub fn passed(&self) -> bool {
        !self.failed
    }

    /// Process exit status for this verdict.
    pub fn exit_code(&self) -> u8 {
        if self.failed {
            exit_codes::FAILED
        } else {
            exit_codes::OK
        }
    }

    /// Summary message.
    pub fn message(&self) -> String {
        if self.failed {
            format!(
                "{} blocking step(s) failed: {}",
                self.failing_steps.len(),
                self.failing_steps.join(", ")
            )
        } else {
            "All blocking steps passed".to_string()
        }
    }
}

/// OR-accumulator over step outcomes.
///
/// Used as a fold: `aggregate = aggregate.record(&result)`. Once a fatal
/// failure is recorded the aggregate stays failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureAggregator {
    verdict: AggregateVerdict,
}

impl FailureAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one step outcome into the aggregate.
    #[must_use]
    pub fn record(mut self, result: &StepResult) -> Self {
        if result.passed() {
            return self;
        }
        if result.is_blocking() {
            self.verdict.failed = true;
            self.verdict.failing_steps.push(result.step_name.clone());
        } else {
            self.verdict
                .advisory_failures
                .push(result.step_name.clone());
        }
        self
    }

    /// Current verdict. Idempotent and side-effect free.
    pub fn finalize(&self) -> AggregateVerdict {
        self.verdict.clone()
    }
}
