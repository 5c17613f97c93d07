//! Shared traversal guard for anything that copies files into a worktree
//! root: the worktree-copy action executor (§4.F) and the worktree manager's
//! `copy` sub-command (§4.I) both need "destination must stay inside root".

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

/// Join `rel` onto `root` and verify the lexically-normalized result stays
/// inside `root`. `root` must exist (it is canonicalized); `rel`'s target
/// need not, since copy destinations usually don't exist yet.
pub fn safe_join(root: &Path, rel: &Path) -> Result<PathBuf> {
    let root = root.canonicalize().map_err(|e| anyhow!("cannot resolve root {}: {e}", root.display()))?;
    let joined = normalize(&root.join(rel));
    if joined.starts_with(&root) {
        Ok(joined)
    } else {
        Err(anyhow!("Path traversal detected: {} escapes {}", rel.display(), root.display()))
    }
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
