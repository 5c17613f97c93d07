//! `ot <job>`: load config, resolve the step DAG, and drive the scheduler.

use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;
use crate::git;
use crate::workflow::{resolver, scheduler};

pub struct RunArgs {
    pub job: String,
    pub config: Option<PathBuf>,
    pub verbose: bool,
    pub fail_fast: bool,
    pub graph: bool,
    pub color: bool,
}

pub fn run(args: RunArgs) -> Result<i32> {
    let config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e:#}");
            return Ok(1);
        }
    };

    let workflow = match config.workflow(&args.job) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("error: {e:#}");
            return Ok(1);
        }
    };

    let all_step_names: Vec<String> = workflow.steps.iter().map(|s| s.name.clone()).collect();
    let resolved = match resolver::resolve(&workflow, &all_step_names) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(1);
        }
    };

    if args.graph {
        print_graph(&resolved);
        return Ok(0);
    }

    let current_branch = git::current_branch().unwrap_or_else(|_| "(unknown)".to_string());
    let in_worktree = git::in_linked_worktree().unwrap_or(false);
    let progress = !args.verbose && std::io::IsTerminal::is_terminal(&std::io::stdout());

    let outcome = scheduler::run(
        resolved,
        &current_branch,
        in_worktree,
        args.fail_fast,
        args.verbose,
        progress,
        args.color,
    );

    eprintln!(
        "{} passed, {} failed, {} skipped in {}",
        outcome.summary.passed,
        outcome.summary.failed,
        outcome.summary.skipped,
        crate::progress::format_duration(outcome.summary.wall_clock_ms)
    );

    Ok(outcome.exit_code)
}

fn print_graph(steps: &[crate::workflow::types::Step]) {
    for step in steps {
        if step.depends_on.is_empty() {
            println!("{}", step.name);
        } else {
            println!("{} <- {}", step.name, step.depends_on.join(", "));
        }
    }
}
