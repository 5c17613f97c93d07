//! Step Scheduler (§4.G): drives per-step execution respecting the
//! dependency graph, the branch predicate, and the fail-fast policy.

use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::warn;

use crate::branch;
use crate::git;
use crate::progress::{Renderer, Status, StepUpdate};
use crate::workflow::actions;
use crate::workflow::types::{Action, ActionResult, RunSummary, Step, StepState, StepStatus};

pub struct RunOutcome {
    pub states: Vec<StepState>,
    pub exit_code: i32,
    pub summary: RunSummary,
}

/// Run a resolved, ordered step set to completion. `progress` drives whether
/// a `Renderer` is attached at all; `color` is forwarded to it.
pub fn run(
    steps: Vec<Step>,
    current_branch: &str,
    in_worktree: bool,
    fail_fast: bool,
    verbose: bool,
    progress: bool,
    color: bool,
) -> RunOutcome {
    let git_root = git::get_repo_root().unwrap_or_else(|_| std::env::current_dir().unwrap());
    let start = Instant::now();

    let name_to_index: HashMap<String, usize> =
        steps.iter().enumerate().map(|(i, s)| (s.name.clone(), i)).collect();

    let mut states: Vec<StepState> = steps
        .into_iter()
        .map(|step| {
            let status = if branch::should_run(&step.branches, current_branch, in_worktree) {
                StepStatus::Pending
            } else {
                StepStatus::Skipped
            };
            StepState::new(step, status)
        })
        .collect();

    let renderer = if progress {
        let names: Vec<String> = states.iter().map(|s| s.step.name.clone()).collect();
        let mut r = Renderer::new(&names, color);
        for s in &states {
            if s.status == StepStatus::Skipped {
                r.update(StepUpdate { name: &s.step.name, status: Status::Skipped, duration_ms: None });
            }
        }
        Some(Arc::new(Mutex::new(r)))
    } else {
        None
    };

    std::thread::scope(|scope| {
        let (tx, rx) = mpsc::channel::<(usize, ActionResult)>();
        let mut running: usize = 0;
        let mut running_since: HashMap<usize, Instant> = HashMap::new();

        loop {
            // Propagate skip/fail-fast before scanning for newly-ready steps.
            let any_failed = states.iter().any(|s| s.status == StepStatus::Failed);
            for i in 0..states.len() {
                if states[i].status != StepStatus::Pending {
                    continue;
                }
                if fail_fast && any_failed {
                    states[i].status = StepStatus::Skipped;
                    notify(&renderer, &states[i].step.name, Status::Skipped, None);
                    continue;
                }
                let dep_blocked = states[i].step.depends_on.iter().any(|dep| {
                    name_to_index
                        .get(dep)
                        .map(|&di| matches!(states[di].status, StepStatus::Failed | StepStatus::Skipped))
                        .unwrap_or(false)
                });
                if dep_blocked {
                    states[i].status = StepStatus::Skipped;
                    notify(&renderer, &states[i].step.name, Status::Skipped, None);
                }
            }

            // Launch every pending step whose dependencies are all done.
            for i in 0..states.len() {
                if states[i].status != StepStatus::Pending {
                    continue;
                }
                let ready = states[i].step.depends_on.iter().all(|dep| {
                    name_to_index
                        .get(dep)
                        .map(|&di| states[di].status == StepStatus::Done)
                        .unwrap_or(true)
                });
                if !ready {
                    continue;
                }

                states[i].status = StepStatus::Running;
                running += 1;
                running_since.insert(i, Instant::now());
                notify(&renderer, &states[i].step.name, Status::Running, None);

                let tx = tx.clone();
                let step = states[i].step.clone();
                let git_root = git_root.clone();
                let renderer_ref = renderer.clone();
                scope.spawn(move || {
                    let result = execute(&step, &git_root, verbose, renderer_ref.as_ref());
                    let _ = tx.send((i, result));
                });
            }

            if running == 0 {
                let still_pending = states.iter().filter(|s| s.status == StepStatus::Pending).count();
                debug_assert_eq!(still_pending, 0, "scheduler exited with pending work and nothing running");
                if still_pending != 0 {
                    warn!(still_pending, "step scheduler exited with unresolved pending steps");
                }
                break;
            }

            // Wait for at least one running action to settle before rescanning.
            let (idx, result) = rx.recv().expect("at least one worker is running");
            running -= 1;
            let elapsed = running_since.remove(&idx).map(|t| t.elapsed().as_millis() as u64);
            states[idx].duration_ms = Some(result.duration_ms.max(elapsed.unwrap_or(result.duration_ms)));
            states[idx].output = result.output;
            states[idx].status = if result.success { StepStatus::Done } else { StepStatus::Failed };
            notify(
                &renderer,
                &states[idx].step.name,
                if result.success { Status::Done } else { Status::Failed },
                states[idx].duration_ms,
            );

            // Drain any other already-settled results without blocking, so a
            // burst of simultaneous completions doesn't force one-at-a-time
            // rescans.
            while let Ok((idx, result)) = rx.try_recv() {
                running -= 1;
                let elapsed = running_since.remove(&idx).map(|t| t.elapsed().as_millis() as u64);
                states[idx].duration_ms = Some(result.duration_ms.max(elapsed.unwrap_or(result.duration_ms)));
                states[idx].output = result.output;
                states[idx].status = if result.success { StepStatus::Done } else { StepStatus::Failed };
                notify(
                    &renderer,
                    &states[idx].step.name,
                    if result.success { Status::Done } else { Status::Failed },
                    states[idx].duration_ms,
                );
            }
        }
    });

    if let Some(r) = &renderer {
        r.lock().unwrap().finish();
    }

    if !verbose {
        for s in &states {
            if s.status == StepStatus::Failed {
                eprintln!("FAILED: {}", s.step.name);
                eprintln!("{}", s.output);
            }
        }
    }

    let summary = RunSummary {
        passed: states.iter().filter(|s| s.status == StepStatus::Done).count(),
        failed: states.iter().filter(|s| s.status == StepStatus::Failed).count(),
        skipped: states.iter().filter(|s| s.status == StepStatus::Skipped).count(),
        wall_clock_ms: start.elapsed().as_millis() as u64,
    };
    let exit_code = if summary.failed > 0 { 1 } else { 0 };

    RunOutcome { states, exit_code, summary }
}

fn execute(step: &Step, git_root: &Path, verbose: bool, renderer: Option<&Arc<Mutex<Renderer>>>) -> ActionResult {
    match &step.action {
        Action::Cmd(cmd) => actions::run_cmd(cmd, git_root, verbose),
        Action::WorktreeCp(cp) => actions::run_worktree_cp(cp, git_root),
        Action::WorkspaceScript(ws) => actions::run_workspace_script(ws, git_root, &step.name, renderer),
    }
}

fn notify(renderer: &Option<Arc<Mutex<Renderer>>>, name: &str, status: Status, duration_ms: Option<u64>) {
    if let Some(r) = renderer {
        r.lock().unwrap().update(StepUpdate { name, status, duration_ms });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::Action;

    fn step(name: &str, depends_on: &[&str], action: Action) -> Step {
        Step {
            name: name.to_string(),
            description: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            branches: Vec::new(),
            action,
        }
    }

    #[test]
    fn all_steps_run_when_no_branch_filters() {
        let steps = vec![
            step("lint", &[], Action::Cmd("true".into())),
            step("build", &["lint"], Action::Cmd("true".into())),
        ];
        let outcome = run(steps, "main", false, true, false, false, false);
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.summary.passed, 2);
        assert_eq!(outcome.summary.failed, 0);
    }

    #[test]
    fn branch_predicate_skips_step() {
        let mut s = step("deploy", &[], Action::Cmd("true".into()));
        s.branches = vec!["release-*".to_string()];
        let outcome = run(vec![s], "main", false, true, false, false, false);
        assert_eq!(outcome.summary.skipped, 1);
        assert_eq!(outcome.exit_code, 0);
    }

    #[test]
    fn failure_skips_fail_fast_dependents() {
        let steps = vec![
            step("lint", &[], Action::Cmd("exit 1".into())),
            step("build", &["lint"], Action::Cmd("true".into())),
        ];
        let outcome = run(steps, "main", false, true, false, false, false);
        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.summary.failed, 1);
        assert_eq!(outcome.summary.skipped, 1);
    }

    #[test]
    fn empty_workflow_runs_cleanly() {
        let outcome = run(Vec::new(), "main", false, true, false, false, false);
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.summary.passed, 0);
    }
}
