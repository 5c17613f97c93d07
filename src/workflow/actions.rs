//! Action Executors (§4.F): cmd, worktree:cp, and workspace-script (bun).
//! Each returns an `ActionResult` and never panics; errors raised inside the
//! body are converted to `{success:false, output, duration}` at the call site.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};

use crate::dag;
use crate::git;
use crate::pathsafe;
use crate::progress::{Renderer, Status};
use crate::taskgraph::{self, TaskNode};
use crate::workflow::types::{ActionResult, WorkspaceScriptAction, WorktreeCpAction};
use crate::workspace;

/// Run a shell command via `sh -c`, capturing combined stdout/stderr.
pub fn run_cmd(cmd: &str, cwd: &Path, verbose: bool) -> ActionResult {
    let start = Instant::now();
    match run_cmd_inner(cmd, cwd, verbose) {
        Ok((success, output)) => {
            ActionResult { success, output, duration_ms: start.elapsed().as_millis() as u64 }
        }
        Err(e) => ActionResult {
            success: false,
            output: e.to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        },
    }
}

fn run_cmd_inner(cmd: &str, cwd: &Path, verbose: bool) -> Result<(bool, String)> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn: {cmd}"))?;

    let buffer = Arc::new(Mutex::new(String::new()));
    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let out_handle = spawn_reader(stdout, buffer.clone(), verbose);
    let err_handle = spawn_reader(stderr, buffer.clone(), verbose);

    let status = child.wait().context("failed to wait on child")?;
    let _ = out_handle.join();
    let _ = err_handle.join();

    let output = Arc::try_unwrap(buffer).map(|m| m.into_inner().unwrap()).unwrap_or_default();
    Ok((status.success(), output))
}

fn spawn_reader(
    mut pipe: impl Read + Send + 'static,
    buffer: Arc<Mutex<String>>,
    verbose: bool,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    let text = String::from_utf8_lossy(&chunk[..n]);
                    if verbose {
                        print!("{text}");
                    }
                    buffer.lock().unwrap().push_str(&text);
                }
                Err(_) => break,
            }
        }
    })
}

/// Resolve `from`/`files` against the current worktrees, copying matches
/// relative to `git_root`.
pub fn run_worktree_cp(action: &WorktreeCpAction, git_root: &Path) -> ActionResult {
    let start = Instant::now();
    match run_worktree_cp_inner(action, git_root) {
        Ok(output) => ActionResult { success: true, output, duration_ms: start.elapsed().as_millis() as u64 },
        Err(e) => ActionResult {
            success: false,
            output: e.to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        },
    }
}

fn run_worktree_cp_inner(action: &WorktreeCpAction, git_root: &Path) -> Result<String> {
    let branch = action.from.strip_prefix("worktree:").unwrap_or(&action.from);
    let (source_root, _) = git::worktree::find_worktree(branch)
        .with_context(|| format!("unknown worktree source \"{}\"", action.from))?;

    let mut copied = 0usize;
    let mut skipped = 0usize;

    for pattern in &action.files {
        let full_pattern = source_root.join(pattern).to_string_lossy().to_string();
        let entries: Vec<PathBuf> = glob::glob(&full_pattern)
            .map_err(|e| anyhow!("invalid glob pattern \"{pattern}\": {e}"))?
            .filter_map(Result::ok)
            .collect();

        if entries.is_empty() {
            if action.allow_missing {
                skipped += 1;
                continue;
            }
            return Err(anyhow!("no files matched pattern \"{pattern}\" in {}", source_root.display()));
        }

        for entry in entries {
            let rel = entry
                .strip_prefix(&source_root)
                .map_err(|_| anyhow!("matched path escaped source worktree"))?;
            let dest = pathsafe::safe_join(git_root, rel)?;
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            if entry.is_dir() {
                let opts = fs_extra::dir::CopyOptions::new().overwrite(true).content_only(true);
                std::fs::create_dir_all(&dest)?;
                fs_extra::dir::copy(&entry, &dest, &opts)
                    .with_context(|| format!("failed to copy dir {}", entry.display()))?;
            } else {
                let opts = fs_extra::file::CopyOptions::new().overwrite(true);
                fs_extra::file::copy(&entry, &dest, &opts)
                    .with_context(|| format!("failed to copy file {}", entry.display()))?;
            }
            copied += 1;
        }
    }

    Ok(format!("copied {copied} file(s), skipped {skipped} missing pattern(s)"))
}

/// Discover workspaces, filter to packages with `script`, build+layer the
/// task DAG, and run it layer by layer. Does not start subsequent layers
/// once any task in a layer has failed.
pub fn run_workspace_script(
    action: &WorkspaceScriptAction,
    git_root: &Path,
    step_name: &str,
    renderer: Option<&Arc<Mutex<Renderer>>>,
) -> ActionResult {
    let start = Instant::now();
    match run_workspace_script_inner(action, git_root, step_name, renderer) {
        Ok((success, output)) => {
            ActionResult { success, output, duration_ms: start.elapsed().as_millis() as u64 }
        }
        Err(e) => ActionResult {
            success: false,
            output: e.to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        },
    }
}

struct TaskOutcome {
    task_id: String,
    success: bool,
    output: String,
}

fn run_workspace_script_inner(
    action: &WorkspaceScriptAction,
    git_root: &Path,
    step_name: &str,
    renderer: Option<&Arc<Mutex<Renderer>>>,
) -> Result<(bool, String)> {
    let packages = workspace::discover(git_root)?;
    let pkg_graph = workspace::dependency_graph(&packages);
    let nodes = taskgraph::build(&action.script, &action.depends_on, &packages, &pkg_graph);

    if nodes.is_empty() {
        return Err(anyhow!("no workspace package has script \"{}\"", action.script));
    }

    if let Some(r) = renderer {
        let ids: Vec<String> = nodes.iter().map(|n| n.task_id().to_string()).collect();
        r.lock().unwrap().register_nested(step_name, &ids);
    }

    let layers = dag::layer(&nodes).map_err(|e| anyhow!(e.to_string()))?;

    let mut summary_lines = Vec::new();
    let mut overall_success = true;

    'layers: for layer in &layers {
        if let Some(r) = renderer {
            let mut r = r.lock().unwrap();
            for node in layer {
                r.update_nested(step_name, node.task_id(), Status::Running, None);
            }
        }

        let outcomes: Vec<TaskOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = layer
                .iter()
                .map(|node| scope.spawn(|| run_task(node, action.timeout())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap_or(TaskOutcome {
                task_id: "unknown".to_string(),
                success: false,
                output: "task thread panicked".to_string(),
            })).collect()
        });

        for outcome in &outcomes {
            if let Some(r) = renderer {
                let status = if outcome.success { Status::Done } else { Status::Failed };
                r.lock().unwrap().update_nested(step_name, &outcome.task_id, status, None);
            }
            let first_line = outcome.output.lines().next().unwrap_or("");
            if outcome.success {
                summary_lines.push(format!("{}: ok", outcome.task_id));
            } else {
                summary_lines.push(format!("{}: FAILED: {}", outcome.task_id, first_line));
                overall_success = false;
            }
        }

        if !overall_success {
            break 'layers;
        }
    }

    Ok((overall_success, summary_lines.join("\n")))
}

const OUTPUT_TAIL_BYTES: usize = 8192;

fn run_task(node: &TaskNode, timeout: Option<Duration>) -> TaskOutcome {
    let result = run_task_inner(node, timeout);
    match result {
        Ok((success, output)) => TaskOutcome { task_id: node.task_id().to_string(), success, output },
        Err(e) => TaskOutcome { task_id: node.task_id().to_string(), success: false, output: e.to_string() },
    }
}

fn run_task_inner(node: &TaskNode, timeout: Option<Duration>) -> Result<(bool, String)> {
    use std::os::unix::process::CommandExt;

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&node.script)
        .current_dir(&node.package_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn()
        .with_context(|| format!("failed to spawn task {}", node.task_id()))?;

    let buffer = Arc::new(Mutex::new(String::new()));
    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");
    let out_handle = spawn_reader(stdout, buffer.clone(), false);
    let err_handle = spawn_reader(stderr, buffer.clone(), false);

    let status = match timeout {
        None => child.wait().context("failed to wait on task child")?,
        Some(limit) => {
            let mut wt_child = wait_timeout::ChildExt::wait_timeout(&mut child, limit)?;
            match wt_child.take() {
                Some(status) => status,
                None => {
                    // Timed out: signal the whole process group, then reap.
                    let pid = nix::unistd::Pid::from_raw(child.id() as i32);
                    let _ = nix::sys::signal::killpg(pid, nix::sys::signal::Signal::SIGTERM);
                    let _ = child.wait();
                    let _ = out_handle.join();
                    let _ = err_handle.join();
                    return Ok((false, format!("Timeout after {}ms", limit.as_millis())));
                }
            }
        }
    };

    let _ = out_handle.join();
    let _ = err_handle.join();

    let mut output = Arc::try_unwrap(buffer).map(|m| m.into_inner().unwrap()).unwrap_or_default();
    if output.len() > OUTPUT_TAIL_BYTES {
        let start = output.len() - OUTPUT_TAIL_BYTES;
        output = output.split_off(start);
    }

    Ok((status.success(), output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmd_executor_captures_stdout_and_reports_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let ok = run_cmd("echo hi", tmp.path(), false);
        assert!(ok.success);
        assert!(ok.output.contains("hi"));

        let failed = run_cmd("exit 3", tmp.path(), false);
        assert!(!failed.success);
    }
}
