//! Run mode: autofix vs check-only.

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// Environment variable that enables autofix mode.
pub const AUTOFIX_ENV: &str = "AUTOFIX";

/// Run mode, resolved once at startup and immutable for the run.
///
/// Autofix only selects the lint step's fix-in-place invocation; it never
/// changes which steps run, their order, or their severity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeConfig {
    pub autofix: bool,
}

impl ModeConfig {
    /// Resolve the mode from the process environment.
    pub fn resolve() -> Result<Self> {
        let value = std::env::var(AUTOFIX_ENV).ok();
        Self::from_value(value.as_deref())
    }

    /// Resolve the mode from a raw `AUTOFIX` value (`None` when unset).
    pub fn from_value(value: Option<&str>) -> Result<Self> {
        Ok(Self {
            autofix: parse_toggle(AUTOFIX_ENV, value)?,
        })
    }

    /// Force autofix on when `enabled`, keeping the resolved value otherwise.
    pub fn or_autofix(self, enabled: bool) -> Self {
        Self {
            autofix: self.autofix || enabled,
        }
    }

    pub fn label(&self) -> &'static str {
        if self.autofix {
            "autofix"
        } else {
            "check"
        }
    }
}

/// Parse a boolean environment toggle. Unset or empty means `false`.
pub(crate) fn parse_toggle(var: &str, value: Option<&str>) -> Result<bool> {
    let Some(raw) = value else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => Err(GateError::InvalidToggle {
            var: var.to_string(),
            value: raw.to_string(),
        }),
    }
}
