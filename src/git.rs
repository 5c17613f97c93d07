//! Git plumbing, invoked as a subprocess (§6's git contracts).

pub mod worktree;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::cmd::Cmd;

/// Custom error type for worktree not found.
#[derive(Debug, thiserror::Error)]
#[error("Worktree not found: {0}")]
pub struct WorktreeNotFound(pub String);

/// Check if we're in a git repository.
pub fn is_git_repo() -> Result<bool> {
    Cmd::new("git").args(&["rev-parse", "--git-dir"]).run_as_check()
}

/// Get the root directory of the git repository (the main worktree's root
/// when invoked from a linked worktree).
pub fn get_repo_root() -> Result<PathBuf> {
    let path = Cmd::new("git")
        .args(&["rev-parse", "--show-toplevel"])
        .run_and_capture_stdout()?;
    Ok(PathBuf::from(path))
}

/// Get the current branch name (`git branch --show-current`). Empty output
/// (detached HEAD) is surfaced as `"(detached)"`.
pub fn current_branch() -> Result<String> {
    let branch = Cmd::new("git")
        .args(&["branch", "--show-current"])
        .run_and_capture_stdout()
        .context("Failed to get current branch")?;
    if branch.is_empty() { Ok("(detached)".to_string()) } else { Ok(branch) }
}

/// Check whether the current working directory is inside a linked worktree
/// rather than the repository's main worktree.
pub fn in_linked_worktree() -> Result<bool> {
    let repo_root = get_repo_root()?;
    let main_root = worktree::get_main_worktree_root()?;
    Ok(repo_root != main_root)
}

/// Check whether `branch_name` exists as a local branch.
pub fn branch_exists(branch_name: &str) -> Result<bool> {
    Cmd::new("git")
        .args(&["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch_name}")])
        .run_as_check()
}

/// Delete a local branch. `force` uses `-D` instead of `-d`.
pub fn delete_branch(branch_name: &str, force: bool, git_common_dir: &Path) -> Result<()> {
    let flag = if force { "-D" } else { "-d" };
    Cmd::new("git")
        .workdir(git_common_dir)
        .args(&["branch", flag, branch_name])
        .run()
        .with_context(|| format!("Failed to delete branch {branch_name}"))?;
    Ok(())
}

/// Get the common git directory (shared across all worktrees), normalized to
/// an absolute path.
pub fn get_git_common_dir() -> Result<PathBuf> {
    let raw = Cmd::new("git")
        .args(&["rev-parse", "--git-common-dir"])
        .run_and_capture_stdout()
        .context("Failed to get git common directory")?;
    if raw.is_empty() {
        return Err(anyhow!("git rev-parse --git-common-dir returned empty output"));
    }
    let path = PathBuf::from(raw);
    if path.is_relative() { Ok(std::env::current_dir()?.join(path)) } else { Ok(path) }
}

/// Get the short HEAD hash for a repository/worktree at `path`.
pub fn short_head(path: &Path) -> Option<String> {
    Cmd::new("git")
        .workdir(path)
        .args(&["rev-parse", "--short", "HEAD"])
        .run_and_capture_stdout()
        .ok()
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_head_unknown_for_nonexistent_path() {
        assert_eq!(short_head(Path::new("/nonexistent/path/xyz")), None);
    }
}
