//! Gate pipeline orchestration.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregator::{AggregateVerdict, FailureAggregator};
use crate::cancel::CancelToken;
use crate::delegate::DelegateInvoker;
use crate::exit_codes;
use crate::mode::ModeConfig;
use crate::plan::plan_digest;
use crate::probe::CapabilityProbe;
use crate::report::ProgressSink;
use crate::result::{FailureKind, StepResult, StepStatus};
use crate::runner::{RunOutcome, StepRunner};
use crate::step::{Step, StepKind};

/// Result of a complete gate run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Unique id of this run.
    pub run_id: String,

    pub mode: ModeConfig,

    /// Digest of the plan's shape (see [`plan_digest`]).
    pub plan_digest: String,

    /// HEAD commit the run was made against, when known.
    pub git_sha: Option<String>,

    /// Number of steps in the plan.
    pub declared_steps: usize,

    /// One result per attempted step, in declaration order.
    pub results: Vec<StepResult>,

    pub verdict: AggregateVerdict,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// The run stopped early because cancellation was requested.
    pub cancelled: bool,

    pub finished_at: DateTime<Utc>,
}

impl PipelineReport {
    /// Number of steps that passed.
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    /// Number of steps that did not pass, advisory included.
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed()).count()
    }

    /// Whether every declared step produced a result.
    pub fn is_complete(&self) -> bool {
        self.results.len() == self.declared_steps
    }

    /// Process exit status for this run.
    pub fn exit_code(&self) -> u8 {
        if self.cancelled {
            exit_codes::CANCELLED
        } else {
            self.verdict.exit_code()
        }
    }
}

/// Drives a plan step by step and reduces it to one verdict.
///
/// Steps run strictly one after another in declaration order. Every step is
/// attempted exactly once whatever happened before it; only cancellation
/// stops the loop early.
pub struct Orchestrator {
    probe: Arc<dyn CapabilityProbe>,
    runner: StepRunner,
    delegate: DelegateInvoker,
    cancel: CancelToken,
}

impl Orchestrator {
    pub fn new(probe: Arc<dyn CapabilityProbe>, runner: StepRunner) -> Self {
        Self {
            probe,
            delegate: DelegateInvoker::new(runner.clone()),
            runner,
            cancel: CancelToken::new(),
        }
    }

    /// Observe `cancel` between and during steps.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run every step of `steps` and return the report.
    pub async fn run(
        &self,
        mode: ModeConfig,
        steps: &[Step],
        progress: &mut dyn ProgressSink,
    ) -> PipelineReport {
        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let total = steps.len();

        info!(
            run_id = %run_id,
            steps = total,
            mode = mode.label(),
            timeout = ?self.runner.timeout(),
            "Starting gate pipeline"
        );

        let mut results = Vec::with_capacity(total);
        let mut aggregate = FailureAggregator::new();
        let mut cancelled = false;

        for (index, step) in steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(step = %step.name, "Cancellation requested, not starting remaining steps");
                cancelled = true;
                break;
            }

            progress.step_started(index, total, step);
            let (result, interrupted) = self.run_step(index, step).await;
            progress.step_finished(step, &result);

            aggregate = aggregate.record(&result);
            results.push(result);

            if interrupted {
                warn!(step = %step.name, "Step interrupted by cancellation");
                cancelled = true;
                break;
            }
        }

        let verdict = aggregate.finalize();
        let report = PipelineReport {
            run_id,
            mode,
            plan_digest: plan_digest(steps),
            git_sha: None,
            declared_steps: total,
            results,
            verdict,
            duration_ms: start.elapsed().as_millis() as u64,
            cancelled,
            finished_at: Utc::now(),
        };

        if report.verdict.passed() && !cancelled {
            info!(
                run_id = %report.run_id,
                passed = report.passed_count(),
                "Gate pipeline passed"
            );
        } else {
            info!(
                run_id = %report.run_id,
                passed = report.passed_count(),
                failed = report.failed_count(),
                verdict = %report.verdict.message(),
                cancelled,
                "Gate pipeline blocked"
            );
        }

        progress.pipeline_finished(&report);
        report
    }

    /// Run one step. Returns its result and whether it was cut short by
    /// cancellation.
    async fn run_step(&self, index: usize, step: &Step) -> (StepResult, bool) {
        let started_at = Utc::now();
        let command = step.invocation.command_line();

        let result = |status: StepStatus, outcome: RunOutcome| StepResult {
            step_name: step.name.clone(),
            index,
            severity: step.severity,
            kind: step.kind,
            status,
            failure_kind: FailureKind::classify(status, step.severity, step.kind),
            command: command.clone(),
            exit_code: outcome.exit_code,
            duration_ms: outcome.duration_ms,
            detail: outcome.detail,
            started_at,
        };

        if let Some(capability) = &step.capability {
            if !self.probe.is_available(capability) {
                warn!(
                    step = %step.name,
                    capability = %capability,
                    severity = step.severity.as_str(),
                    "Required capability not found"
                );
                let outcome = RunOutcome {
                    passed: false,
                    exit_code: None,
                    duration_ms: 0,
                    detail: Some(format!("capability '{}' not found", capability)),
                    cancelled: false,
                };
                return (result(StepStatus::CapabilityMissing, outcome), false);
            }
        }

        info!(step = %step.name, command = %command, "Executing step");
        let outcome = match step.kind {
            StepKind::Command => self.runner.execute(&step.invocation, &self.cancel).await,
            StepKind::Delegate => self.delegate.execute(&step.invocation, &self.cancel).await,
        };

        let interrupted = outcome.cancelled;
        let status = if outcome.passed {
            StepStatus::Passed
        } else {
            StepStatus::Failed
        };
        if status == StepStatus::Failed {
            warn!(
                step = %step.name,
                severity = step.severity.as_str(),
                kind = ?FailureKind::classify(status, step.severity, step.kind),
                detail = outcome.detail.as_deref().unwrap_or(""),
                "Step failed"
            );
        }
        (result(status, outcome), interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedExecutor;
    use crate::probe::StaticProbe;
    use crate::report::SilentProgress;
    use crate::step::Invocation;

    fn steps() -> Vec<Step> {
        vec![
            Step::advisory("provision", Invocation::new("pip", vec![])),
            Step::fatal("lint", Invocation::new("ruff", vec![])).requires("ruff"),
            Step::fatal("test", Invocation::new("pytest", vec![])),
        ]
    }

    async fn run(executor: ScriptedExecutor, probe: StaticProbe) -> PipelineReport {
        let orchestrator =
            Orchestrator::new(Arc::new(probe), StepRunner::new(Arc::new(executor)));
        orchestrator
            .run(ModeConfig::default(), &steps(), &mut SilentProgress)
            .await
    }

    #[tokio::test]
    async fn test_all_passing() {
        let report = run(ScriptedExecutor::new(), StaticProbe::with(["ruff"])).await;
        assert!(report.verdict.passed());
        assert_eq!(report.passed_count(), 3);
        assert_eq!(report.exit_code(), exit_codes::OK);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_results_follow_declaration_order() {
        let report = run(ScriptedExecutor::new().exit("ruff", 1), StaticProbe::with(["ruff"])).await;
        let order: Vec<(usize, &str)> = report
            .results
            .iter()
            .map(|r| (r.index, r.step_name.as_str()))
            .collect();
        assert_eq!(order, [(0, "provision"), (1, "lint"), (2, "test")]);
        assert_eq!(report.results[1].command, "ruff");
    }

    #[tokio::test]
    async fn test_missing_capability_is_fatal() {
        let report = run(ScriptedExecutor::new(), StaticProbe::empty()).await;
        assert_eq!(report.results[1].status, StepStatus::CapabilityMissing);
        assert_eq!(
            report.results[1].failure_kind,
            Some(FailureKind::CapabilityMissing)
        );
        assert_eq!(report.verdict.failing_steps, vec!["lint"]);
        assert_eq!(report.exit_code(), exit_codes::FAILED);
        assert_eq!(report.results.len(), 3);
    }

    #[tokio::test]
    async fn test_advisory_failure_does_not_block() {
        let report = run(ScriptedExecutor::new().exit("pip", 1), StaticProbe::with(["ruff"])).await;
        assert_eq!(report.results[0].status, StepStatus::Failed);
        assert_eq!(report.results[0].failure_kind, Some(FailureKind::Provisioning));
        assert_eq!(report.failed_count(), 1);
        assert!(report.verdict.passed());
        assert_eq!(report.verdict.advisory_failures, vec!["provision"]);
        assert_eq!(report.exit_code(), exit_codes::OK);
    }

    #[tokio::test]
    async fn test_cancellation_stops_and_reports_partial_verdict() {
        let report = run(
            ScriptedExecutor::new().cancelled("ruff"),
            StaticProbe::with(["ruff"]),
        )
        .await;
        assert!(report.cancelled);
        assert!(!report.is_complete());
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.verdict.failing_steps, vec!["lint"]);
        assert_eq!(report.exit_code(), exit_codes::CANCELLED);
    }
}
