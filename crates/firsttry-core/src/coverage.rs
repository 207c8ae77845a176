//! Coverage threshold check for the strict test variant.
//!
//! Only the root `line-rate` attribute of a Cobertura report is read; nothing
//! else in the file is interpreted.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Default minimum line coverage, in percent.
pub const DEFAULT_THRESHOLD: f64 = 80.0;

/// Reasons a coverage report cannot satisfy the gate.
#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("coverage report {0:?} not found")]
    Missing(PathBuf),

    #[error("failed to read coverage report {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("coverage report {0:?} has no line-rate on its <coverage> element")]
    NoLineRate(PathBuf),

    #[error("coverage {actual:.2}% is below the {threshold:.2}% threshold")]
    BelowThreshold { actual: f64, threshold: f64 },
}

fn line_rate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"<coverage\b[^>]*?\bline-rate\s*=\s*["']([0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)["']"#)
            .expect("line-rate pattern is valid")
    })
}

/// Extract the root line coverage, in percent, from Cobertura XML text.
pub fn parse_line_rate(xml: &str) -> Option<f64> {
    let caps = line_rate_pattern().captures(xml)?;
    let rate: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(rate * 100.0)
}

/// Read the line coverage percentage from the report at `path`.
pub fn read_line_rate(path: &Path) -> Result<f64, CoverageError> {
    if !path.exists() {
        return Err(CoverageError::Missing(path.to_path_buf()));
    }
    let xml = std::fs::read_to_string(path).map_err(|source| CoverageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_line_rate(&xml).ok_or_else(|| CoverageError::NoLineRate(path.to_path_buf()))
}

/// Remove a report left behind by an earlier run, so only a report written
/// by the current test run can satisfy the gate.
pub fn clear_report(path: &Path) -> Result<(), CoverageError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CoverageError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Check the report at `path` against `threshold` percent.
///
/// Returns the measured percentage when it meets the threshold.
pub fn check_threshold(path: &Path, threshold: f64) -> Result<f64, CoverageError> {
    let actual = read_line_rate(path)?;
    if actual + f64::EPSILON < threshold {
        return Err(CoverageError::BelowThreshold { actual, threshold });
    }
    Ok(actual)
}
