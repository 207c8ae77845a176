//! Git hooks that run the gate before a commit or push.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{GateError, Result};
use crate::git;

/// Marker line identifying a hook written by `firsttry install-hooks`.
pub const HOOK_MARKER: &str = "# installed by firsttry install-hooks";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHook {
    /// Runs the test step before each commit.
    PreCommit,
    /// Runs the full gate before each push.
    PrePush,
}

impl GitHook {
    pub const ALL: [GitHook; 2] = [GitHook::PreCommit, GitHook::PrePush];

    pub fn file_name(&self) -> &'static str {
        match self {
            GitHook::PreCommit => "pre-commit",
            GitHook::PrePush => "pre-push",
        }
    }

    /// `firsttry` subcommand the hook runs.
    pub fn subcommand(&self) -> &'static str {
        match self {
            GitHook::PreCommit => "test",
            GitHook::PrePush => "run",
        }
    }

    pub fn script(&self) -> String {
        format!(
            "#!/bin/sh\n{}\n# A non-zero exit aborts the {}.\nexec firsttry {}\n",
            HOOK_MARKER,
            match self {
                GitHook::PreCommit => "commit",
                GitHook::PrePush => "push",
            },
            self.subcommand()
        )
    }
}

/// Write the pre-commit and pre-push hooks for the repository at `root`.
///
/// Hooks previously written by firsttry are replaced. Any other existing
/// hook is reported as an error unless `force` is set, and no hook is
/// written when that happens.
pub fn install_hooks(root: &Path, force: bool) -> Result<Vec<PathBuf>> {
    let hooks_dir =
        git::hooks_dir(root).ok_or_else(|| GateError::NotAGitRepo(root.to_path_buf()))?;

    let targets: Vec<(GitHook, PathBuf)> = GitHook::ALL
        .iter()
        .map(|hook| (*hook, hooks_dir.join(hook.file_name())))
        .collect();

    if !force {
        for (_, path) in &targets {
            if path.exists() && !is_ours(path) {
                return Err(GateError::HookExists(path.clone()));
            }
        }
    }

    std::fs::create_dir_all(&hooks_dir)?;
    let mut installed = Vec::with_capacity(targets.len());
    for (hook, path) in targets {
        std::fs::write(&path, hook.script())?;
        make_executable(&path)?;
        info!(hook = hook.file_name(), path = ?path, "Installed git hook");
        installed.push(path);
    }
    Ok(installed)
}

fn is_ours(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .map(|text| text.contains(HOOK_MARKER))
        .unwrap_or(false)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
