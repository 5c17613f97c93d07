//! CLI dispatch targets: `run` (the default `ot <job>` surface), `wt`
//! (worktree management), and `schema` (config JSON Schema).

pub mod run;
pub mod schema;
pub mod wt;
