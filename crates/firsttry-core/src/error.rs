//! Error types for the quality gate.
//!
//! Step failures are never errors: they become `StepResult`s. The types here
//! cover what can go wrong around the pipeline (configuration, plan
//! construction, report output) and inside the process executor.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while configuring or reporting a gate run.
#[derive(Error, Debug)]
pub enum GateError {
    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A boolean environment toggle had an unrecognised value.
    #[error("invalid value for {var}: {value:?} (expected one of 0/1, true/false, yes/no, on/off)")]
    InvalidToggle { var: String, value: String },

    /// A step was declared without a program to run.
    #[error("step '{0}' has an empty command")]
    EmptyCommand(String),

    /// The delegate validator was declared with advisory severity.
    #[error("delegate step '{0}' must be fatal")]
    AdvisoryDelegate(String),

    /// Two steps in one plan share a name.
    #[error("duplicate step name '{0}'")]
    DuplicateStep(String),

    /// Hooks were requested outside a git repository.
    #[error("{0:?} is not a git repository")]
    NotAGitRepo(PathBuf),

    /// A hook not written by firsttry is already in place.
    #[error("{0:?} already exists and was not installed by firsttry (use --force to replace it)")]
    HookExists(PathBuf),

    /// The config file exists but could not be read.
    #[error("failed to read {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for `GateConfig`.
    #[error("failed to parse {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Report serialization error
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Whether this error means the user supplied a bad configuration or
    /// environment, as opposed to a runtime I/O problem.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            GateError::InvalidConfig(_)
                | GateError::InvalidToggle { .. }
                | GateError::EmptyCommand(_)
                | GateError::AdvisoryDelegate(_)
                | GateError::DuplicateStep(_)
                | GateError::NotAGitRepo(_)
                | GateError::HookExists(_)
                | GateError::ConfigIo { .. }
                | GateError::ConfigParse { .. }
        )
    }
}

/// Result type for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;

/// Errors from running one external process.
///
/// These never leave the step runner; they are folded into a failed result.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting on '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("cancelled")]
    Cancelled,
}
