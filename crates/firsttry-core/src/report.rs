//! Progress lines, the gate summary block, and the JSON report.

use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::pipeline::PipelineReport;
use crate::result::{StepResult, StepStatus};
use crate::step::{Severity, Step};

const SUMMARY_TITLE: &str = "FirstTry Gate Summary";
const LABEL_WIDTH: usize = 14;

/// Receives pipeline events as they happen.
pub trait ProgressSink {
    fn step_started(&mut self, index: usize, total: usize, step: &Step);
    fn step_finished(&mut self, step: &Step, result: &StepResult);
    fn pipeline_finished(&mut self, report: &PipelineReport);
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn step_started(&mut self, _index: usize, _total: usize, _step: &Step) {}
    fn step_finished(&mut self, _step: &Step, _result: &StepResult) {}
    fn pipeline_finished(&mut self, _report: &PipelineReport) {}
}

/// Human-readable progress written to `out` (stdout in the CLI).
///
/// Write errors are ignored: a closed stdout must not change the verdict.
pub struct ConsoleProgress<W: Write> {
    out: W,
    summary: bool,
}

impl<W: Write> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out, summary: true }
    }

    /// Skip the summary block at the end of the run.
    pub fn without_summary(mut self) -> Self {
        self.summary = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressSink for ConsoleProgress<W> {
    fn step_started(&mut self, index: usize, total: usize, step: &Step) {
        let _ = writeln!(
            self.out,
            "==> [{}/{}] {}: {}",
            index + 1,
            total,
            step.name,
            step.invocation.command_line()
        );
    }

    fn step_finished(&mut self, step: &Step, result: &StepResult) {
        let _ = writeln!(self.out, "{}", step_marker(step, result));
    }

    fn pipeline_finished(&mut self, report: &PipelineReport) {
        if self.summary {
            let _ = write!(self.out, "\n{}", render_summary(report));
        }
        let _ = self.out.flush();
    }
}

fn step_marker(step: &Step, result: &StepResult) -> String {
    let advisory = if !step.is_fatal() {
        " (advisory, ignored)"
    } else {
        ""
    };
    match result.status {
        StepStatus::Passed => format!("  ok  {} ({} ms)", step.name, result.duration_ms),
        StepStatus::Failed => {
            let mut line = format!("  FAIL {}: {}", step.name, result.command);
            if let Some(detail) = &result.detail {
                line.push_str(&format!(" [{}]", detail));
            }
            line.push_str(advisory);
            line
        }
        StepStatus::CapabilityMissing => format!(
            "  MISSING {}: capability '{}' not found{}",
            step.name,
            step.capability.as_deref().unwrap_or(""),
            advisory
        ),
    }
}

/// Render the end-of-run summary block.
///
/// Steps never attempted because the run was cancelled are only counted.
pub fn render_summary(report: &PipelineReport) -> String {
    let mut out = String::new();
    out.push_str(SUMMARY_TITLE);
    out.push('\n');
    out.push_str(&"-".repeat(SUMMARY_TITLE.len()));
    out.push('\n');

    for result in &report.results {
        let mut line = format!(
            "{:.<width$} {}",
            result.step_name,
            result.status.label(),
            width = LABEL_WIDTH
        );
        if !result.passed() && result.severity == Severity::Advisory {
            line.push_str(" (advisory)");
        }
        out.push_str(&line);
        out.push('\n');
    }
    let skipped = report.declared_steps.saturating_sub(report.results.len());
    if skipped > 0 {
        out.push_str(&format!("({} step(s) not run)\n", skipped));
    }

    out.push('\n');
    let verdict = if report.verdict.passed() {
        "SAFE"
    } else {
        "BLOCKED"
    };
    if report.cancelled {
        out.push_str(&format!("Verdict: {} (CANCELLED)\n", verdict));
    } else {
        out.push_str(&format!("Verdict: {}\n", verdict));
    }
    out
}

/// Serialize `report` as pretty JSON.
pub fn to_json(report: &PipelineReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write the JSON report to `path`, creating parent directories.
pub fn write_json_report(path: &Path, report: &PipelineReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, to_json(report)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::FailureAggregator;
    use crate::mode::ModeConfig;
    use crate::result::sample;
    use crate::step::Invocation;
    use chrono::Utc;

    fn report(results: Vec<StepResult>, declared: usize, cancelled: bool) -> PipelineReport {
        let verdict = results
            .iter()
            .fold(FailureAggregator::new(), |agg, r| agg.record(r))
            .finalize();
        PipelineReport {
            run_id: "run".into(),
            mode: ModeConfig::default(),
            plan_digest: "digest".into(),
            git_sha: None,
            declared_steps: declared,
            results,
            verdict,
            duration_ms: 10,
            cancelled,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_block() {
        let r = report(
            vec![
                sample("provision", Severity::Advisory, StepStatus::Failed),
                sample("lint", Severity::Fatal, StepStatus::CapabilityMissing),
                sample("test", Severity::Fatal, StepStatus::Passed),
            ],
            3,
            false,
        );
        let text = render_summary(&r);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "FirstTry Gate Summary");
        assert_eq!(lines[1], "---------------------");
        assert_eq!(lines[2], "provision..... FAIL (advisory)");
        assert_eq!(lines[3], "lint.......... MISSING");
        assert_eq!(lines[4], "test.......... PASS");
        assert_eq!(lines.last(), Some(&"Verdict: BLOCKED"));
    }

    #[test]
    fn test_summary_safe_and_cancelled() {
        let safe = report(vec![sample("lint", Severity::Fatal, StepStatus::Passed)], 1, false);
        assert!(render_summary(&safe).ends_with("Verdict: SAFE\n"));

        let cancelled = report(vec![sample("lint", Severity::Fatal, StepStatus::Passed)], 3, true);
        let text = render_summary(&cancelled);
        assert!(text.contains("(2 step(s) not run)"));
        assert!(text.ends_with("Verdict: SAFE (CANCELLED)\n"));
    }

    #[test]
    fn test_console_progress_lines() {
        let step = Step::fatal("lint", Invocation::new("ruff", vec!["check".into()]));
        let mut failed = sample("lint", Severity::Fatal, StepStatus::Failed);
        failed.command = "ruff check".into();
        failed.detail = Some("exited with code 1".into());

        let mut progress = ConsoleProgress::new(Vec::new()).without_summary();
        progress.step_started(1, 6, &step);
        progress.step_finished(&step, &failed);
        progress.pipeline_finished(&report(vec![failed.clone()], 1, false));

        let text = String::from_utf8(progress.into_inner()).unwrap();
        assert_eq!(
            text,
            "==> [2/6] lint: ruff check\n  FAIL lint: ruff check [exited with code 1]\n"
        );
    }

    #[test]
    fn test_missing_marker_names_capability() {
        let step = Step::fatal("lint", Invocation::new("ruff", vec![])).requires("ruff");
        let missing = sample("lint", Severity::Fatal, StepStatus::CapabilityMissing);
        assert_eq!(
            step_marker(&step, &missing),
            "  MISSING lint: capability 'ruff' not found"
        );
    }

    #[test]
    fn test_write_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        let r = report(vec![sample("lint", Severity::Fatal, StepStatus::Failed)], 1, false);
        write_json_report(&path, &r).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["verdict"]["failed"], true);
        assert_eq!(value["results"][0]["status"], "failed");
        assert_eq!(value["mode"]["autofix"], false);
    }
}
