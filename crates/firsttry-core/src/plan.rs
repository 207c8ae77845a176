//! Building the ordered step list from configuration and mode.

use std::collections::HashSet;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::mode::ModeConfig;
use crate::step::{BuiltinStep, Invocation, Severity, Step, StepKind, SuccessPredicate};

/// Build the full six-step plan in declaration order.
///
/// `root` becomes every step's working directory; the delegate runs in
/// `root/<delegate.dir>` when a directory is configured.
pub fn build_plan(config: &GateConfig, mode: ModeConfig, root: &Path) -> Result<Vec<Step>> {
    build_subset(config, mode, root, &BuiltinStep::ORDER)
}

/// Build a plan containing only `only`, still in declaration order.
pub fn build_subset(
    config: &GateConfig,
    mode: ModeConfig,
    root: &Path,
    only: &[BuiltinStep],
) -> Result<Vec<Step>> {
    let steps = BuiltinStep::ORDER
        .iter()
        .filter(|b| only.contains(b))
        .map(|b| build_step(*b, config, mode, root))
        .collect::<Result<Vec<_>>>()?;
    validate_plan(&steps)?;
    Ok(steps)
}

fn build_step(
    builtin: BuiltinStep,
    config: &GateConfig,
    mode: ModeConfig,
    root: &Path,
) -> Result<Step> {
    let name = builtin.name();
    let invocation = |argv: &[String]| invocation_in(name, argv, root);

    let step = match builtin {
        BuiltinStep::Provision => {
            Step::advisory(name, invocation(config.provision.command.as_slice())?)
        }
        BuiltinStep::Lint => {
            let argv = match (&config.lint.fix_command, mode.autofix) {
                (Some(fix), true) => fix,
                _ => &config.lint.command,
            };
            let inv = invocation(argv.as_slice())?;
            let capability = probe_name(config.lint.capability.as_deref(), &config.lint.command);
            Step::fatal(name, inv).requires(capability)
        }
        BuiltinStep::Format => {
            let inv = invocation(config.format.command.as_slice())?;
            let capability =
                probe_name(config.format.capability.as_deref(), &config.format.command);
            Step::fatal(name, inv).requires(capability)
        }
        BuiltinStep::Typecheck => {
            let inv = invocation(config.typecheck.command.as_slice())?;
            let capability =
                probe_name(config.typecheck.capability.as_deref(), &config.typecheck.command);
            Step::fatal(name, inv).requires(capability)
        }
        BuiltinStep::Test => {
            let mut inv = invocation(config.test.command.as_slice())?;
            if !config.test.path.is_empty() {
                inv.args.push(config.test.path.clone());
            }
            if config.coverage.strict {
                inv.args.push("--cov".to_string());
                inv.args.push(format!(
                    "--cov-report=xml:{}",
                    config.coverage.report.display()
                ));
                inv = inv.with_success(SuccessPredicate::CoverageAtLeast {
                    report: config.coverage.report.clone(),
                    threshold: config.coverage.threshold,
                });
            }
            Step::fatal(name, inv)
        }
        BuiltinStep::Delegate => {
            let mut inv = invocation(config.delegate.command.as_slice())?;
            if let Some(dir) = &config.delegate.dir {
                inv = inv.with_cwd(root.join(dir));
            }
            let capability =
                probe_name(config.delegate.capability.as_deref(), &config.delegate.command);
            Step::delegate(name, inv).requires(capability)
        }
    };
    Ok(step)
}

fn invocation_in(name: &str, argv: &[String], root: &Path) -> Result<Invocation> {
    Invocation::from_argv(argv)
        .map(|inv| inv.with_cwd(root))
        .ok_or_else(|| GateError::EmptyCommand(name.to_string()))
}

/// Explicit capability, else the command's program.
fn probe_name(explicit: Option<&str>, command: &[String]) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| command.first().cloned())
        .unwrap_or_default()
}

/// Reject plans the orchestrator must never run.
pub fn validate_plan(steps: &[Step]) -> Result<()> {
    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.name.as_str()) {
            return Err(GateError::DuplicateStep(step.name.clone()));
        }
        if step.invocation.program.trim().is_empty() {
            return Err(GateError::EmptyCommand(step.name.clone()));
        }
        if step.kind == StepKind::Delegate && step.severity != Severity::Fatal {
            return Err(GateError::AdvisoryDelegate(step.name.clone()));
        }
    }
    Ok(())
}

/// Deterministic digest of the plan's shape.
///
/// Covers each step's name, severity, kind and capability in order, but not
/// its invocation, so autofix and check mode share a digest.
pub fn plan_digest(steps: &[Step]) -> String {
    let mut hasher = Sha256::new();
    for step in steps {
        hasher.update(step.name.as_bytes());
        hasher.update(b"\0");
        hasher.update(step.severity.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(match step.kind {
            StepKind::Command => b"command".as_slice(),
            StepKind::Delegate => b"delegate".as_slice(),
        });
        hasher.update(b"\0");
        hasher.update(step.capability.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
