//! Repository state captured for the run report.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// HEAD commit SHA of the repository containing `dir`.
///
/// Returns `None` outside a git work tree or when git is not installed; the
/// report simply omits the SHA then.
pub fn head_sha(dir: &Path) -> Option<String> {
    let output = match Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(dir)
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            debug!(error = %e, "git not available");
            return None;
        }
    };

    if !output.status.success() {
        debug!(
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "git rev-parse HEAD failed"
        );
        return None;
    }

    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

/// Directory git reads hooks from for the repository at `dir`.
///
/// A plain `.git` directory is used directly; otherwise (worktrees,
/// submodules, `core.hooksPath`) git itself is asked.
pub fn hooks_dir(dir: &Path) -> Option<PathBuf> {
    let dot_git = dir.join(".git");
    if dot_git.is_dir() {
        return Some(dot_git.join("hooks"));
    }

    let output = Command::new("git")
        .args(["rev-parse", "--git-path", "hooks"])
        .current_dir(dir)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let path = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
    Some(if path.is_relative() { dir.join(path) } else { path })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    #[test]
    fn test_head_sha_in_fresh_repo() {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);

        let sha = head_sha(dir.path()).unwrap();
        assert_eq!(sha.len(), 40, "SHA should be 40 hex chars, got: {sha}");
        assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hooks_dir_of_plain_checkout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        assert_eq!(hooks_dir(dir.path()), Some(dir.path().join(".git").join("hooks")));
    }

    #[test]
    fn test_hooks_dir_outside_repo_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(hooks_dir(dir.path()), None);
    }

    #[test]
    fn test_head_sha_outside_repo_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(head_sha(dir.path()), None);
    }
}
