//! FirstTry - local quality gate
//!
//! Runs a fixed, ordered sequence of verification steps and reduces their
//! outcomes to a single verdict:
//! - provisioning (advisory), lint, format, type check, tests
//! - a delegate step handing off to a secondary validator
//! - autofix mode that only swaps the lint invocation
//! - git hooks that run the gate before commit and push

pub mod aggregator;
pub mod cancel;
pub mod config;
pub mod coverage;
pub mod delegate;
pub mod doctor;
pub mod error;
pub mod exec;
pub mod exit_codes;
pub mod fakes;
pub mod git;
pub mod hooks;
pub mod mode;
pub mod pipeline;
pub mod plan;
pub mod probe;
pub mod report;
pub mod result;
pub mod runner;
pub mod step;
pub mod telemetry;

// Re-export key types
pub use aggregator::{AggregateVerdict, FailureAggregator};
pub use cancel::CancelToken;
pub use config::GateConfig;
pub use doctor::{run_doctor, DoctorReport};
pub use error::{ExecError, GateError, Result};
pub use exec::{CommandExecutor, ExitInfo, ProcessExecutor};
pub use hooks::{install_hooks, GitHook};
pub use mode::ModeConfig;
pub use pipeline::{Orchestrator, PipelineReport};
pub use plan::{build_plan, build_subset, plan_digest};
pub use probe::{CapabilityProbe, PathProbe, StaticProbe};
pub use report::{ConsoleProgress, ProgressSink, SilentProgress};
pub use result::{StepResult, StepStatus};
pub use runner::StepRunner;
pub use step::{BuiltinStep, Invocation, Severity, Step, StepKind};
