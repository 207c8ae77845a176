//! End-to-end gate runs over the stock plan with a scripted executor.

use std::path::Path;
use std::sync::Arc;

use firsttry_core::fakes::ScriptedExecutor;
use firsttry_core::{
    build_plan, build_subset, exit_codes, BuiltinStep, CancelToken, ConsoleProgress, GateConfig,
    ModeConfig, Orchestrator, PipelineReport, SilentProgress, StaticProbe, StepRunner, StepStatus,
};

const ALL_TOOLS: [&str; 4] = ["ruff", "black", "mypy", "make"];

/// Stock config with provisioning on `pip` so it can be scripted apart from
/// the test step's `python`.
fn config() -> GateConfig {
    let mut config = GateConfig::default();
    config.provision.command = vec!["pip".into(), "install".into(), "-e".into(), ".[dev]".into()];
    config
}

async fn run_gate(
    executor: Arc<ScriptedExecutor>,
    probe: StaticProbe,
    mode: ModeConfig,
) -> PipelineReport {
    let steps = build_plan(&config(), mode, Path::new("/repo")).unwrap();
    let orchestrator = Orchestrator::new(Arc::new(probe), StepRunner::new(executor));
    orchestrator.run(mode, &steps, &mut SilentProgress).await
}

/// Scenario: every capability present and every step passes.
#[tokio::test]
async fn test_all_steps_pass() {
    let executor = Arc::new(ScriptedExecutor::new());
    let report = run_gate(executor.clone(), StaticProbe::with(ALL_TOOLS), ModeConfig::default()).await;

    assert_eq!(report.results.len(), 6);
    assert!(report.results.iter().all(|r| r.status == StepStatus::Passed));
    assert_eq!(report.exit_code(), exit_codes::OK);
    assert_eq!(
        executor.programs(),
        ["pip", "ruff", "black", "mypy", "python", "make"]
    );
}

/// Scenario: lint tool absent. Lint is a blocking failure, the other five
/// steps still run, and no process is started for lint.
#[tokio::test]
async fn test_missing_lint_capability() {
    let executor = Arc::new(ScriptedExecutor::new());
    let report = run_gate(
        executor.clone(),
        StaticProbe::with(["black", "mypy", "make"]),
        ModeConfig::default(),
    )
    .await;

    assert_eq!(report.results.len(), 6);
    assert_eq!(report.results[1].status, StepStatus::CapabilityMissing);
    assert_eq!(report.verdict.failing_steps, vec!["lint"]);
    assert_eq!(report.exit_code(), exit_codes::FAILED);
    assert!(!executor.programs().contains(&"ruff".to_string()));
    assert_eq!(executor.programs().len(), 5);
}

/// Scenario: autofix on, lint runs in fix mode but violations remain.
#[tokio::test]
async fn test_autofix_with_unfixable_violations() {
    let executor = Arc::new(ScriptedExecutor::new().exit("ruff", 1));
    let mode = ModeConfig::from_value(Some("1")).unwrap();
    let report = run_gate(executor.clone(), StaticProbe::with(ALL_TOOLS), mode).await;

    let lint_call = &executor.calls()[1];
    assert_eq!(lint_call.command_line(), "ruff check --fix .");
    assert_eq!(report.results[1].status, StepStatus::Failed);
    assert_eq!(report.exit_code(), exit_codes::FAILED);
    assert!(report.mode.autofix);
}

/// Scenario: delegate fails while all local steps pass.
#[tokio::test]
async fn test_delegate_failure_blocks() {
    let executor = Arc::new(ScriptedExecutor::new().exit("make", 2));
    let report = run_gate(executor.clone(), StaticProbe::with(ALL_TOOLS), ModeConfig::default()).await;

    assert_eq!(report.verdict.failing_steps, vec!["delegate"]);
    assert_eq!(report.exit_code(), exit_codes::FAILED);
    let detail = report.results[5].detail.clone().unwrap();
    assert!(detail.starts_with("delegate validator failed"), "{detail}");
    assert_eq!(
        executor.calls()[5].cwd.as_deref(),
        Some(Path::new("/repo/frontend"))
    );
}

/// Scenario: provisioning fails, the rest pass.
#[tokio::test]
async fn test_provisioning_failure_is_advisory() {
    let executor = Arc::new(ScriptedExecutor::new().unspawnable("pip"));
    let report = run_gate(executor, StaticProbe::with(ALL_TOOLS), ModeConfig::default()).await;

    assert_eq!(report.results[0].status, StepStatus::Failed);
    assert_eq!(report.verdict.advisory_failures, vec!["provision"]);
    assert!(report.verdict.failing_steps.is_empty());
    assert_eq!(report.exit_code(), exit_codes::OK);
}

#[tokio::test]
async fn test_every_step_attempted_despite_failures() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .exit("ruff", 1)
            .exit("black", 1)
            .timed_out("mypy")
            .exit("python", 1),
    );
    let report = run_gate(executor.clone(), StaticProbe::with(ALL_TOOLS), ModeConfig::default()).await;

    assert!(report.is_complete());
    assert_eq!(
        report.verdict.failing_steps,
        vec!["lint", "format", "typecheck", "test"]
    );
    assert_eq!(executor.programs().len(), 6);
}

#[tokio::test]
async fn test_autofix_does_not_change_plan_shape() {
    let check = run_gate(
        Arc::new(ScriptedExecutor::new()),
        StaticProbe::with(ALL_TOOLS),
        ModeConfig::default(),
    )
    .await;
    let fix = run_gate(
        Arc::new(ScriptedExecutor::new()),
        StaticProbe::with(ALL_TOOLS),
        ModeConfig { autofix: true },
    )
    .await;

    assert_eq!(check.plan_digest, fix.plan_digest);
    let shape = |r: &PipelineReport| -> Vec<(String, String)> {
        r.results
            .iter()
            .map(|s| (s.step_name.clone(), s.severity.as_str().to_string()))
            .collect()
    };
    assert_eq!(shape(&check), shape(&fix));
}

#[tokio::test]
async fn test_cancel_before_start_runs_nothing() {
    let executor = Arc::new(ScriptedExecutor::new());
    let steps = build_plan(&config(), ModeConfig::default(), Path::new("/repo")).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    let orchestrator = Orchestrator::new(
        Arc::new(StaticProbe::with(ALL_TOOLS)),
        StepRunner::new(executor.clone()),
    )
    .with_cancel(cancel);
    let report = orchestrator
        .run(ModeConfig::default(), &steps, &mut SilentProgress)
        .await;

    assert!(report.cancelled);
    assert!(report.results.is_empty());
    assert!(executor.programs().is_empty());
    assert_eq!(report.exit_code(), exit_codes::CANCELLED);
}

#[tokio::test]
async fn test_strict_coverage_below_threshold_fails_test_step() {
    let dir = tempfile::tempdir().unwrap();

    let mut config = config();
    config.coverage.strict = true;
    let steps = build_subset(
        &config,
        ModeConfig::default(),
        dir.path(),
        &[BuiltinStep::Test],
    )
    .unwrap();

    let orchestrator = Orchestrator::new(
        Arc::new(StaticProbe::empty()),
        StepRunner::new(Arc::new(ScriptedExecutor::new().writes(
            "python",
            "coverage.xml",
            r#"<?xml version="1.0" ?><coverage version="7.4" line-rate="0.612" branch-rate="0"></coverage>"#,
        ))),
    );
    let report = orchestrator
        .run(ModeConfig::default(), &steps, &mut SilentProgress)
        .await;

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].status, StepStatus::Failed);
    let detail = report.results[0].detail.clone().unwrap();
    assert!(detail.contains("61.2"), "{detail}");
    assert_eq!(report.exit_code(), exit_codes::FAILED);
}

#[tokio::test]
async fn test_strict_gate_ignores_report_from_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("coverage.xml"),
        r#"<coverage line-rate="0.99"></coverage>"#,
    )
    .unwrap();

    let mut config = config();
    config.coverage.strict = true;
    let steps = build_subset(
        &config,
        ModeConfig::default(),
        dir.path(),
        &[BuiltinStep::Test],
    )
    .unwrap();

    // The test command exits 0 but writes no report this time.
    let orchestrator = Orchestrator::new(
        Arc::new(StaticProbe::empty()),
        StepRunner::new(Arc::new(ScriptedExecutor::new())),
    );
    let report = orchestrator
        .run(ModeConfig::default(), &steps, &mut SilentProgress)
        .await;

    assert_eq!(report.results[0].status, StepStatus::Failed);
    assert_eq!(report.exit_code(), exit_codes::FAILED);
}

#[tokio::test]
async fn test_console_output_for_full_run() {
    let steps = build_plan(&config(), ModeConfig::default(), Path::new("/repo")).unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(StaticProbe::with(["black", "mypy", "make"])),
        StepRunner::new(Arc::new(ScriptedExecutor::new())),
    );
    let mut progress = ConsoleProgress::new(Vec::new());
    orchestrator
        .run(ModeConfig::default(), &steps, &mut progress)
        .await;

    let text = String::from_utf8(progress.into_inner()).unwrap();
    assert!(text.starts_with("==> [1/6] provision: pip install -e .[dev]\n"));
    assert!(text.contains("  MISSING lint: capability 'ruff' not found\n"));
    assert!(text.contains("==> [6/6] delegate: make check\n"));
    assert!(text.contains("lint.......... MISSING\n"));
    assert!(text.ends_with("Verdict: BLOCKED\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_real_processes() {
    use firsttry_core::ProcessExecutor;

    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("frontend")).unwrap();

    let sh = |script: &str| vec!["sh".to_string(), "-c".to_string(), script.to_string()];
    let mut config = GateConfig::default();
    config.provision.command = sh("exit 1");
    config.lint.command = sh("true");
    config.lint.fix_command = None;
    config.format.command = sh("true");
    config.typecheck.command = sh("true");
    config.test.command = sh("test -d frontend");
    config.test.path = String::new();
    config.delegate.command = sh("test \"$(basename \"$PWD\")\" = frontend");

    let steps = build_plan(&config, ModeConfig::default(), dir.path()).unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(StaticProbe::with(["sh"])),
        StepRunner::new(Arc::new(ProcessExecutor)),
    );
    let report = orchestrator
        .run(ModeConfig::default(), &steps, &mut SilentProgress)
        .await;

    let statuses: Vec<StepStatus> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        [
            StepStatus::Failed,
            StepStatus::Passed,
            StepStatus::Passed,
            StepStatus::Passed,
            StepStatus::Passed,
            StepStatus::Passed,
        ]
    );
    assert_eq!(report.exit_code(), exit_codes::OK);
}
