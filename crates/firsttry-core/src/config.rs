//! Gate configuration: `firsttry.toml` plus environment overrides.
//!
//! Every field has a default matching the stock pipeline, so a repository
//! without a config file still gets the full six-step gate.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::coverage::DEFAULT_THRESHOLD;
use crate::error::{GateError, Result};
use crate::mode::parse_toggle;

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "firsttry.toml";

pub const TEST_PATH_ENV: &str = "FIRSTTRY_TEST_PATH";
pub const COVERAGE_THRESHOLD_ENV: &str = "FIRSTTRY_COVERAGE_THRESHOLD";
pub const STRICT_ENV: &str = "FIRSTTRY_STRICT";
pub const STEP_TIMEOUT_ENV: &str = "FIRSTTRY_STEP_TIMEOUT";

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Complete gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Per-step timeout in seconds; 0 disables it.
    pub step_timeout_secs: u64,

    pub provision: ProvisionConfig,

    pub lint: LintConfig,

    #[serde(default = "default_format")]
    pub format: CheckConfig,

    #[serde(default = "default_typecheck")]
    pub typecheck: CheckConfig,

    pub test: TestConfig,

    pub coverage: CoverageConfig,

    pub delegate: DelegateConfig,

    pub dev: DevConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: 1800,
            provision: ProvisionConfig::default(),
            lint: LintConfig::default(),
            format: default_format(),
            typecheck: default_typecheck(),
            test: TestConfig::default(),
            coverage: CoverageConfig::default(),
            delegate: DelegateConfig::default(),
            dev: DevConfig::default(),
        }
    }
}

/// Dependency provisioning (advisory, never probed).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    pub command: Vec<String>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            command: argv(&["python", "-m", "pip", "install", "-e", ".[dev]"]),
        }
    }
}

/// Lint step, with an optional fix-in-place variant for autofix mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LintConfig {
    pub command: Vec<String>,

    /// Used instead of `command` in autofix mode.
    pub fix_command: Option<Vec<String>>,

    /// Capability to probe; defaults to the command's program.
    pub capability: Option<String>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            command: argv(&["ruff", "check", "."]),
            fix_command: Some(argv(&["ruff", "check", "--fix", "."])),
            capability: None,
        }
    }
}

/// A probed check step (format, typecheck).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CheckConfig {
    pub command: Vec<String>,

    /// Capability to probe; defaults to the command's program.
    #[serde(default)]
    pub capability: Option<String>,
}

fn default_format() -> CheckConfig {
    CheckConfig {
        command: argv(&["black", "--check", "."]),
        capability: None,
    }
}

fn default_typecheck() -> CheckConfig {
    CheckConfig {
        command: argv(&["mypy", "."]),
        capability: None,
    }
}

/// Test step; the configured path is appended to the command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TestConfig {
    pub command: Vec<String>,
    pub path: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            command: argv(&["python", "-m", "pytest", "-q"]),
            path: "tests".to_string(),
        }
    }
}

/// Coverage enforcement for the strict test variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageConfig {
    /// Enforce `threshold` on the test step.
    pub strict: bool,

    /// Minimum line coverage in percent.
    pub threshold: f64,

    /// Cobertura XML report written by the test run.
    pub report: PathBuf,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            strict: false,
            threshold: DEFAULT_THRESHOLD,
            report: PathBuf::from("coverage.xml"),
        }
    }
}

/// The delegate validator for the secondary codebase segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DelegateConfig {
    pub command: Vec<String>,

    /// Directory the delegate runs in, relative to the gate root.
    pub dir: Option<PathBuf>,

    /// Capability to probe; defaults to the command's program.
    pub capability: Option<String>,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            command: argv(&["make", "check"]),
            dir: Some(PathBuf::from("frontend")),
            capability: None,
        }
    }
}

/// Local development server task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DevConfig {
    pub command: Vec<String>,

    /// Feature-flag variable set for the server.
    pub flag_env: String,

    pub flag_value: String,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            command: argv(&["python", "-m", "uvicorn", "app.main:app", "--reload"]),
            flag_env: "FEATURE_FLAGS".to_string(),
            flag_value: "dev".to_string(),
        }
    }
}

impl GateConfig {
    /// Parse a config from TOML text. Missing keys take defaults.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| GateError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load `firsttry.toml` from `dir` (defaults when absent), apply
    /// environment overrides, and validate.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|source| GateError::ConfigIo {
                path: path.clone(),
                source,
            })?;
            info!(path = ?path, "Loaded gate config");
            Self::from_toml_str(&text, &path)?
        } else {
            debug!(path = ?path, "No config file, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(TEST_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            self.test.path = path;
        }

        if let Some(raw) = lookup(COVERAGE_THRESHOLD_ENV) {
            self.coverage.threshold = raw.trim().parse().map_err(|_| {
                GateError::InvalidConfig(format!(
                    "{} must be a number, got {:?}",
                    COVERAGE_THRESHOLD_ENV, raw
                ))
            })?;
        }

        if let Some(raw) = lookup(STRICT_ENV) {
            if parse_toggle(STRICT_ENV, Some(&raw))? {
                self.coverage.strict = true;
            }
        }

        if let Some(raw) = lookup(STEP_TIMEOUT_ENV) {
            self.step_timeout_secs = raw.trim().parse().map_err(|_| {
                GateError::InvalidConfig(format!(
                    "{} must be a whole number of seconds, got {:?}",
                    STEP_TIMEOUT_ENV, raw
                ))
            })?;
        }

        Ok(())
    }

    /// Check value ranges and that every command has a program.
    pub fn validate(&self) -> Result<()> {
        let commands: [(&str, &[String]); 6] = [
            ("provision", &self.provision.command),
            ("lint", &self.lint.command),
            ("format", &self.format.command),
            ("typecheck", &self.typecheck.command),
            ("test", &self.test.command),
            ("delegate", &self.delegate.command),
        ];
        for (name, command) in commands {
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(GateError::EmptyCommand(name.to_string()));
            }
        }
        if matches!(&self.lint.fix_command, Some(fix) if fix.is_empty()) {
            return Err(GateError::EmptyCommand("lint (fix_command)".to_string()));
        }
        if self.dev.command.is_empty() {
            return Err(GateError::EmptyCommand("dev".to_string()));
        }

        let threshold = self.coverage.threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(GateError::InvalidConfig(format!(
                "coverage threshold must be between 0 and 100, got {}",
                threshold
            )));
        }
        Ok(())
    }

    /// Per-step timeout, `None` when disabled.
    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }
}
