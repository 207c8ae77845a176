//! Capability probing: is a tool reachable before we try to run it?

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::PathBuf;

use tracing::debug;

/// Answers whether a named capability can be invoked in this environment.
///
/// Implementations must be side-effect free.
pub trait CapabilityProbe: Send + Sync {
    fn is_available(&self, capability: &str) -> bool;
}

/// Resolves capabilities as executables on a search path.
#[derive(Debug, Clone, Default)]
pub struct PathProbe {
    /// Overrides `PATH` when set.
    search_path: Option<OsString>,
}

impl PathProbe {
    /// Probe against the process `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe against an explicit search path instead of `PATH`.
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    /// Full path of the capability, if it resolves.
    pub fn locate(&self, capability: &str) -> Option<PathBuf> {
        let found = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                which::which_in(capability, Some(paths), cwd)
            }
            None => which::which(capability),
        };
        found.ok()
    }
}

impl CapabilityProbe for PathProbe {
    fn is_available(&self, capability: &str) -> bool {
        let location = self.locate(capability);
        debug!(capability, found = ?location, "Probed capability");
        location.is_some()
    }
}

/// Probe backed by a fixed set of capability names.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    available: BTreeSet<String>,
}

impl StaticProbe {
    /// A probe that reports every name in `names` as available.
    pub fn with<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            available: names.into_iter().map(Into::into).collect(),
        }
    }

    /// A probe that reports nothing as available.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl CapabilityProbe for StaticProbe {
    fn is_available(&self, capability: &str) -> bool {
        self.available.contains(capability)
    }
}
