//! `ot wt`: worktree add/remove/list.

use anyhow::Result;
use tabled::Tabled;

use crate::config::Config;
use crate::git;
use crate::worktree::{AddOptions, RemoveOptions, WorktreeManager};

pub enum WtCommand {
    Add { branch: String, new_branch: bool, base: Option<String>, force: bool },
    Remove { branch: String, force: bool, with_branch: bool },
    List,
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "BRANCH")]
    branch: String,
    #[tabled(rename = "HEAD")]
    head: String,
    #[tabled(rename = "PATH")]
    path: String,
    #[tabled(rename = "MAIN")]
    main: String,
}

pub fn run(command: WtCommand) -> Result<i32> {
    let git_root = git::get_repo_root()?;
    let config = Config::load(None).unwrap_or_default();
    let manager = WorktreeManager::new(git_root, config)?;

    match command {
        WtCommand::Add { branch, new_branch, base, force } => {
            let opts = AddOptions { new_branch, force, base };
            match manager.add(&branch, opts) {
                Ok(path) => {
                    println!("{}", path.display());
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("error: {e:#}");
                    Ok(1)
                }
            }
        }
        WtCommand::Remove { branch, force, with_branch } => {
            let opts = RemoveOptions { force, delete_branch: with_branch };
            match manager.remove(&branch, opts) {
                Ok(()) => Ok(0),
                Err(e) => {
                    eprintln!("error: {e:#}");
                    Ok(1)
                }
            }
        }
        WtCommand::List => {
            let worktrees = manager.list()?;
            let rows: Vec<Row> = worktrees
                .into_iter()
                .map(|(info, head)| Row {
                    branch: info.branch,
                    head,
                    path: info.path.display().to_string(),
                    main: if info.is_main { "*".to_string() } else { String::new() },
                })
                .collect();
            println!("{}", tabled::Table::new(rows));
            Ok(0)
        }
    }
}
