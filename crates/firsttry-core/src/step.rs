//! Step definitions: what runs, how it is invoked, and how much it matters.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whether a step's failure affects the aggregate verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Failure (or a missing capability) blocks the gate.
    Fatal,

    /// Failure is reported but never blocks the gate.
    Advisory,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::Advisory => "advisory",
        }
    }
}

/// How the orchestrator dispatches a step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// A single tool invocation run by the step runner.
    Command,

    /// A whole secondary pipeline run by the delegate invoker.
    Delegate,
}

/// The builtin steps of the stock pipeline, in declaration order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStep {
    /// Editable install / dependency sync.
    Provision,

    /// Linter, in check or fix mode.
    Lint,

    /// Formatter in check mode.
    Format,

    /// Static type checker.
    Typecheck,

    /// Test suite, scoped to the configured path.
    Test,

    /// Secondary validator for the other codebase segment.
    Delegate,
}

impl BuiltinStep {
    /// Declaration order of the stock pipeline.
    pub const ORDER: [BuiltinStep; 6] = [
        BuiltinStep::Provision,
        BuiltinStep::Lint,
        BuiltinStep::Format,
        BuiltinStep::Typecheck,
        BuiltinStep::Test,
        BuiltinStep::Delegate,
    ];

    /// Get the step name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinStep::Provision => "provision",
            BuiltinStep::Lint => "lint",
            BuiltinStep::Format => "format",
            BuiltinStep::Typecheck => "typecheck",
            BuiltinStep::Test => "test",
            BuiltinStep::Delegate => "delegate",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            BuiltinStep::Provision => Severity::Advisory,
            _ => Severity::Fatal,
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            BuiltinStep::Delegate => StepKind::Delegate,
            _ => StepKind::Command,
        }
    }

    /// Parse a builtin step from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ORDER.iter().copied().find(|s| s.name() == name)
    }
}

/// When a finished process counts as a pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SuccessPredicate {
    /// Exit status zero.
    ExitZero,

    /// Exit status zero and the Cobertura report at `report` shows at least
    /// `threshold` percent line coverage.
    CoverageAtLeast { report: PathBuf, threshold: f64 },
}

/// Invocation descriptor: the argv-equivalent of a step plus its success test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invocation {
    /// Executable name or path.
    pub program: String,

    /// Arguments after the program.
    pub args: Vec<String>,

    /// Extra environment variables for the child process.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<(String, String)>,

    /// Working directory (inherits the caller's when `None`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    pub success: SuccessPredicate,
}

impl Invocation {
    /// Create an invocation that passes on exit status zero.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
            cwd: None,
            success: SuccessPredicate::ExitZero,
        }
    }

    /// Split an argv vector into program and arguments.
    ///
    /// Returns `None` for an empty vector.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_success(mut self, success: SuccessPredicate) -> Self {
        self.success = success;
        self
    }

    /// The command as a single display string.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One discrete verification or provisioning action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Step name, unique within a plan.
    pub name: String,

    pub invocation: Invocation,

    /// Capability that must be reachable before the step may run.
    pub capability: Option<String>,

    pub severity: Severity,

    pub kind: StepKind,
}

impl Step {
    /// A command step whose failure blocks the gate.
    pub fn fatal(name: impl Into<String>, invocation: Invocation) -> Self {
        Self {
            name: name.into(),
            invocation,
            capability: None,
            severity: Severity::Fatal,
            kind: StepKind::Command,
        }
    }

    /// A best-effort command step.
    pub fn advisory(name: impl Into<String>, invocation: Invocation) -> Self {
        Self {
            severity: Severity::Advisory,
            ..Self::fatal(name, invocation)
        }
    }

    /// The delegate validator step. Always fatal.
    pub fn delegate(name: impl Into<String>, invocation: Invocation) -> Self {
        Self {
            kind: StepKind::Delegate,
            ..Self::fatal(name, invocation)
        }
    }

    /// Require a capability before the step runs.
    pub fn requires(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}
