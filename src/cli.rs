//! CLI surface (§6): `ot <job> [options]`, the `wt` sub-command, and the
//! `schema`/`completions` utility sub-commands.

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};

use crate::command;

#[derive(Parser)]
#[command(name = "ot")]
#[command(about = "A TurboRepo-style task runner with Git worktree awareness")]
#[command(version)]
struct Cli {
    /// Job (workflow) name to run.
    job: Option<String>,

    /// Job name, as an alternative to the positional form.
    #[arg(long = "job")]
    job_flag: Option<String>,

    /// Path to an explicit config file, bypassing discovery.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Stream step output as it is produced instead of only on failure.
    #[arg(short, long)]
    verbose: bool,

    /// Explicit (redundant) opt-in; fail-fast is already the default.
    #[arg(long)]
    fail_fast: bool,

    /// Let already-started siblings keep running after a failure.
    #[arg(long)]
    no_fail_fast: bool,

    /// Print the resolved step DAG and exit without running anything.
    #[arg(long)]
    graph: bool,

    /// Disable progress-renderer colorization.
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage git worktrees.
    Wt {
        #[command(subcommand)]
        action: WtAction,
    },

    /// Print the JSON Schema of the config file format.
    Schema,

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum WtAction {
    /// Create a new worktree.
    Add {
        /// Branch to check out (or create, with `-b`).
        branch: String,

        /// Create `branch` as a new branch rather than checking out an existing one.
        #[arg(short = 'b', long = "new-branch")]
        new_branch: bool,

        /// Base ref to branch from (implies `-b` semantics server-side).
        #[arg(long)]
        base: Option<String>,

        /// Overwrite an existing worktree directory.
        #[arg(short, long)]
        force: bool,
    },

    /// Remove a worktree.
    #[command(visible_alias = "rm")]
    Remove {
        /// Branch name (or worktree directory name) to remove.
        branch: String,

        /// Force removal even with local changes.
        #[arg(short, long)]
        force: bool,

        /// Also delete the local branch after removing the worktree.
        #[arg(long)]
        with_branch: bool,
    },

    /// List worktrees.
    #[command(visible_alias = "ls")]
    List,
}

/// Parse argv and run, returning the process exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Wt { action }) => command::wt::run(action_to_command(action)),
        Some(Commands::Schema) => {
            command::schema::run();
            Ok(0)
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
            Ok(0)
        }
        None => {
            let job = cli.job.or(cli.job_flag);
            let Some(job) = job else {
                eprintln!("error: no job specified (usage: ot <job>)");
                return Ok(1);
            };
            command::run::run(command::run::RunArgs {
                job,
                config: cli.config,
                verbose: cli.verbose,
                fail_fast: !cli.no_fail_fast,
                graph: cli.graph,
                color: !cli.no_color,
            })
        }
    }
}

fn action_to_command(action: WtAction) -> command::wt::WtCommand {
    match action {
        WtAction::Add { branch, new_branch, base, force } => {
            command::wt::WtCommand::Add { branch, new_branch, base, force }
        }
        WtAction::Remove { branch, force, with_branch } => {
            command::wt::WtCommand::Remove { branch, force, with_branch }
        }
        WtAction::List => command::wt::WtCommand::List,
    }
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
