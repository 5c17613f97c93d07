//! Worktree Manager (§4.I): add/remove/list/copy with path-traversal safety
//! and post-create hooks. Grounded in the `git/worktree.rs` porcelain parser
//! and create/list primitives, genericized to this surface (no tmux, no
//! agent, no sandbox concerns carried over).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use thiserror::Error;
use tracing::warn;

use crate::config::{Config, Hook};
use crate::git;
use crate::pathsafe;
use crate::workflow::types::WorktreeInfo;

#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("worktree already exists at {0}")]
    AlreadyExists(PathBuf),
    #[error("refusing to remove the main worktree")]
    MainWorktreeRemoval,
    #[error("worktree not found: {0}")]
    NotFound(String),
    #[error("Path traversal detected: {0}")]
    PathTraversal(String),
}

#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub new_branch: bool,
    pub force: bool,
    pub base: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RemoveOptions {
    pub force: bool,
    pub delete_branch: bool,
}

pub struct WorktreeManager {
    git_root: PathBuf,
    git_common_dir: PathBuf,
    base_dir: PathBuf,
    config: Config,
}

impl WorktreeManager {
    pub fn new(git_root: PathBuf, config: Config) -> Result<Self> {
        let base_dir = config.base_dir(&git_root);
        let git_common_dir = git::get_git_common_dir()?;
        Ok(Self { git_root, git_common_dir, base_dir, config })
    }

    /// Enumerate worktrees, augmented with a short HEAD hash (`"unknown"` if
    /// it cannot be determined). By convention the first entry is the main
    /// worktree.
    pub fn list(&self) -> Result<Vec<(WorktreeInfo, String)>> {
        let worktrees = git::worktree::list_worktrees()?;
        let main_root = git::worktree::get_main_worktree_root().ok();

        Ok(worktrees
            .into_iter()
            .enumerate()
            .map(|(i, (path, branch))| {
                let is_main = main_root.as_ref().map(|m| m == &path).unwrap_or(i == 0);
                let head = git::short_head(&path).unwrap_or_else(|| "unknown".to_string());
                (WorktreeInfo { path, branch, is_main }, head)
            })
            .collect())
    }

    /// Create a new worktree for `branch` under the configured base dir, then
    /// run post-create hooks inside it (hook failures are logged only).
    pub fn add(&self, branch: &str, opts: AddOptions) -> Result<PathBuf> {
        let path = self.base_dir.join(branch);

        std::fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("failed to create base dir {}", self.base_dir.display()))?;

        if path.exists() && !opts.force {
            return Err(WorktreeError::AlreadyExists(path).into());
        }

        git::worktree::create_worktree(&path, branch, opts.new_branch, opts.base.as_deref())
            .with_context(|| format!("failed to add worktree for {branch}"))?;

        for hook in self.config.post_create_hooks() {
            if let Err(e) = run_hook(hook, &path) {
                warn!(branch, error = %e, "post-create hook failed");
            }
        }

        Ok(path)
    }

    /// Remove the worktree for `branch` (or a path-suffix match). Refuses to
    /// remove the main worktree. Optionally deletes the local branch
    /// afterward, warning (not failing) if that fails.
    pub fn remove(&self, branch: &str, opts: RemoveOptions) -> Result<()> {
        let (path, resolved_branch) = git::worktree::find_worktree(branch)
            .map_err(|_| WorktreeError::NotFound(branch.to_string()))?;

        let main_root = git::worktree::get_main_worktree_root()?;
        if path == main_root {
            return Err(WorktreeError::MainWorktreeRemoval.into());
        }

        git::worktree::remove_worktree(&path, opts.force)
            .with_context(|| format!("failed to remove worktree {}", path.display()))?;

        if opts.delete_branch
            && let Err(e) = git::delete_branch(&resolved_branch, opts.force, &self.git_common_dir)
        {
            warn!(branch = resolved_branch, error = %e, "failed to delete branch after worktree removal");
        }

        Ok(())
    }

    /// Copy `src` to `dest`, each parsed as `[BRANCH@]PATH`. A glob source
    /// expands relative to the source worktree; the destination structure is
    /// preserved under `dest`. Every resolved destination must stay inside
    /// its worktree root.
    pub fn copy(&self, src: &str, dest: &str, cwd: &Path) -> Result<()> {
        let (src_branch, src_path) = parse_spec(src);
        let (dest_branch, dest_path) = parse_spec(dest);

        let src_root = self.resolve_root(src_branch.as_deref())?;
        let dest_root = self.resolve_root(dest_branch.as_deref())?;

        let src_rel = relative_to_root(&src_path, cwd, &self.git_root)?;
        let dest_rel = relative_to_root(&dest_path, cwd, &self.git_root)?;

        if !has_glob_chars(&src_rel.to_string_lossy()) {
            let source = pathsafe::safe_join(&src_root, &src_rel)
                .map_err(|_| WorktreeError::PathTraversal(src_rel.display().to_string()))?;
            if !source.exists() {
                return Err(anyhow!("source path does not exist: {}", source.display()));
            }
            let destination = pathsafe::safe_join(&dest_root, &dest_rel)
                .map_err(|_| WorktreeError::PathTraversal(dest_rel.display().to_string()))?;
            copy_path(&source, &destination)?;
            return Ok(());
        }

        let guarded_pattern = pathsafe::safe_join(&src_root, &src_rel)
            .map_err(|_| WorktreeError::PathTraversal(src_rel.display().to_string()))?;
        let full_pattern = guarded_pattern.to_string_lossy().to_string();
        let mut matched_any = false;
        for entry in glob::glob(&full_pattern)?.filter_map(Result::ok) {
            matched_any = true;
            let rel = entry.strip_prefix(&src_root).unwrap_or(&entry);
            let destination = pathsafe::safe_join(&dest_root, &dest_path.join(rel))
                .map_err(|_| WorktreeError::PathTraversal(rel.display().to_string()))?;
            copy_path(&entry, &destination)?;
        }
        if !matched_any {
            return Err(anyhow!("no files matched pattern: {}", full_pattern));
        }
        Ok(())
    }

    fn resolve_root(&self, branch: Option<&str>) -> Result<PathBuf> {
        match branch {
            None => Ok(self.git_root.clone()),
            Some(b) => {
                git::worktree::find_worktree(b).map(|(path, _)| path).map_err(|_| WorktreeError::NotFound(b.to_string()).into())
            }
        }
    }
}

fn has_glob_chars(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[')
}

fn parse_spec(spec: &str) -> (Option<String>, PathBuf) {
    match spec.split_once('@') {
        Some((branch, path)) => (Some(branch.to_string()), PathBuf::from(path)),
        None => (None, PathBuf::from(spec)),
    }
}

/// Resolve a raw CLI-relative path against `cwd`, then re-express it relative
/// to `root` (the git root) so a given relative path behaves the same
/// regardless of which subdirectory the user invoked the command from.
fn relative_to_root(raw: &Path, cwd: &Path, root: &Path) -> Result<PathBuf> {
    if raw.is_absolute() {
        return Ok(raw.to_path_buf());
    }
    let absolute = normalize(&cwd.join(raw));
    let root_abs = normalize(&root.canonicalize().unwrap_or_else(|_| root.to_path_buf()));
    pathdiff::diff_paths(&absolute, &root_abs).ok_or_else(|| anyhow!("cannot express {} relative to {}", absolute.display(), root_abs.display()))
}

fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn copy_path(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if source.is_dir() {
        std::fs::create_dir_all(destination)?;
        let opts = fs_extra::dir::CopyOptions::new().overwrite(true).content_only(true);
        fs_extra::dir::copy(source, destination, &opts)
            .with_context(|| format!("failed to copy dir {}", source.display()))?;
    } else {
        let opts = fs_extra::file::CopyOptions::new().overwrite(true);
        fs_extra::file::copy(source, destination, &opts)
            .with_context(|| format!("failed to copy file {}", source.display()))?;
    }
    Ok(())
}

fn run_hook(hook: &Hook, worktree_path: &Path) -> Result<()> {
    match hook {
        Hook::Cmd { cmd } => {
            let status = std::process::Command::new("sh")
                .arg("-c")
                .arg(cmd)
                .current_dir(worktree_path)
                .status()
                .with_context(|| format!("failed to spawn hook command: {cmd}"))?;
            if !status.success() {
                return Err(anyhow!("hook command exited with {:?}: {cmd}", status.code()));
            }
            Ok(())
        }
        Hook::Copy { kind: _, from, to } => {
            let source = worktree_path.join(from);
            let destination = pathsafe::safe_join(worktree_path, Path::new(to))?;
            copy_path(&source, &destination)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager_rooted_at(root: &Path) -> WorktreeManager {
        WorktreeManager {
            git_root: root.to_path_buf(),
            git_common_dir: root.to_path_buf(),
            base_dir: root.join("../worktrees"),
            config: Config::default(),
        }
    }

    #[test]
    fn parses_branch_at_path() {
        assert_eq!(parse_spec("feature@src/x"), (Some("feature".to_string()), PathBuf::from("src/x")));
        assert_eq!(parse_spec("src/x"), (None, PathBuf::from("src/x")));
    }

    #[test]
    fn copy_rejects_source_path_traversal_and_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let manager = manager_rooted_at(tmp.path());

        let err = manager
            .copy("../../../etc/passwd", "passwd", tmp.path())
            .unwrap_err();
        assert!(err.to_string().contains("Path traversal detected"));
        assert!(!tmp.path().join("passwd").exists());
    }

    #[test]
    fn copy_allows_source_and_destination_inside_root() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "hello").unwrap();
        let manager = manager_rooted_at(tmp.path());

        manager.copy("a.txt", "b.txt", tmp.path()).unwrap();
        assert_eq!(std::fs::read_to_string(tmp.path().join("b.txt")).unwrap(), "hello");
    }

    #[test]
    fn glob_chars_detected() {
        assert!(has_glob_chars("src/*.rs"));
        assert!(!has_glob_chars("src/main.rs"));
    }
}
