mod branch;
mod cli;
mod cmd;
mod command;
mod config;
mod dag;
mod git;
mod jsonc;
mod logger;
mod pathsafe;
mod progress;
mod taskgraph;
mod workflow;
mod workspace;
mod worktree;

use anyhow::Result;
use tracing::{error, info};

fn main() -> Result<()> {
    logger::init()?;
    info!(args = ?std::env::args().collect::<Vec<_>>(), "ot start");

    match cli::run() {
        Ok(code) => {
            info!(code, "ot finished");
            std::process::exit(code);
        }
        Err(err) => {
            error!(error = ?err, "ot failed");
            Err(err)
        }
    }
}
