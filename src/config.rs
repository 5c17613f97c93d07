//! Config loading: JSON/JSONC discovery walk, comment stripping, and the
//! `workflows`/`worktree` shape (§3, §6).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use schemars::JsonSchema;
use serde::Deserialize;
use thiserror::Error;

use crate::jsonc;
use crate::workflow::types::{RawWorkflow, Workflow};

const CANDIDATE_NAMES: &[&str] = &[
    "workflow.json",
    "workflow.jsonc",
    "workflows.json",
    "workflows.jsonc",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file found (searched up from {0} to the git root)")]
    NotFound(PathBuf),
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("job \"{0}\" not found in config")]
    UnknownJob(String),
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub workflows: HashMap<String, RawWorkflow>,
    #[serde(default)]
    pub worktree: Option<WorktreeSettings>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct WorktreeSettings {
    #[serde(default)]
    pub defaults: Option<WorktreeDefaults>,
    #[serde(default)]
    pub hooks: Option<WorktreeHooks>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct WorktreeDefaults {
    #[serde(default)]
    pub base_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct WorktreeHooks {
    #[serde(default)]
    pub post_create: Vec<Hook>,
}

/// A post-create hook, deserialized untagged so either shape parses as-is:
/// `{type:"copy", from, to}` for a structured worktree-relative copy, or
/// `{cmd}` for an arbitrary shell command (see DESIGN.md).
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Hook {
    Copy {
        #[serde(rename = "type")]
        kind: CopyHookType,
        from: String,
        to: String,
    },
    Cmd {
        cmd: String,
    },
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub enum CopyHookType {
    #[serde(rename = "copy")]
    Copy,
}

impl Config {
    /// Load the config, either from an explicit path or by discovery walk.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = match explicit_path {
            Some(p) => p.to_path_buf(),
            None => discover(&std::env::current_dir()?)?,
        };
        Self::load_from_path(&path)
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let stripped = jsonc::strip(&raw);

        // `package.json`'s `workflows` field is nested; every other
        // candidate file is the config document itself.
        let value: serde_json::Value =
            serde_json::from_str(&stripped).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let doc = if path.file_name().and_then(|n| n.to_str()) == Some("package.json") {
            value.get("workflows").cloned().unwrap_or(serde_json::json!({}))
        } else {
            value
        };

        let config: Config = serde_json::from_value(doc).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    /// Resolve the named job into a typed `Workflow`.
    pub fn workflow(&self, job: &str) -> Result<Workflow> {
        let raw = self
            .workflows
            .get(job)
            .ok_or_else(|| ConfigError::UnknownJob(job.to_string()))?
            .clone();
        Ok(Workflow::try_from(raw)?)
    }

    pub fn base_dir(&self, repo_root: &Path) -> PathBuf {
        let configured = self
            .worktree
            .as_ref()
            .and_then(|w| w.defaults.as_ref())
            .and_then(|d| d.base_dir.as_deref());
        match configured {
            Some(dir) => {
                let p = PathBuf::from(dir);
                if p.is_absolute() { p } else { repo_root.join(p) }
            }
            None => repo_root.join("../worktrees"),
        }
    }

    pub fn post_create_hooks(&self) -> &[Hook] {
        self.worktree
            .as_ref()
            .and_then(|w| w.hooks.as_ref())
            .map(|h| h.post_create.as_slice())
            .unwrap_or(&[])
    }
}

/// Walk from `start` up to the git root, checking each candidate file name at
/// every level, then git-root-only `.config/workflow(.jsonc|.json)` and
/// `.config/workflows(.jsonc|.json)`.
pub fn discover(start: &Path) -> Result<PathBuf> {
    let git_root = crate::git::get_repo_root().ok();

    let mut dir = start.to_path_buf();
    loop {
        for name in CANDIDATE_NAMES {
            let candidate = dir.join(name);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        let package_json = dir.join("package.json");
        if package_json.exists()
            && let Ok(contents) = fs::read_to_string(&package_json)
            && let Ok(value) = serde_json::from_str::<serde_json::Value>(&jsonc::strip(&contents))
            && value.get("workflows").is_some()
        {
            return Ok(package_json);
        }

        if Some(&dir) == git_root.as_ref() {
            break;
        }

        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(root) = &git_root {
        for sub in [".config/workflow.jsonc", ".config/workflow.json", ".config/workflows.jsonc", ".config/workflows.json"] {
            let candidate = root.join(sub);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    Err(anyhow!(ConfigError::NotFound(start.to_path_buf())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_simple_array_workflow() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("workflow.json");
        fs::write(
            &path,
            r#"{"workflows":{"ci":[{"name":"lint","cmd":"echo lint"}]}}"#,
        )
        .unwrap();
        let config = Config::load_from_path(&path).unwrap();
        let wf = config.workflow("ci").unwrap();
        assert_eq!(wf.steps.len(), 1);
        assert_eq!(wf.steps[0].name, "lint");
    }

    #[test]
    fn loads_record_form_workflow() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("workflow.jsonc");
        fs::write(
            &path,
            r#"{
                // jsonc comment
                "workflows": {"ci": {"steps": [{"name":"lint","cmd":"echo lint"}]}}
            }"#,
        )
        .unwrap();
        let config = Config::load_from_path(&path).unwrap();
        let wf = config.workflow("ci").unwrap();
        assert_eq!(wf.steps.len(), 1);
    }

    #[test]
    fn unknown_job_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("workflow.json");
        fs::write(&path, r#"{"workflows":{}}"#).unwrap();
        let config = Config::load_from_path(&path).unwrap();
        assert!(config.workflow("missing").is_err());
    }

    #[test]
    fn base_dir_defaults_to_sibling_worktrees() {
        let config = Config::default();
        let root = PathBuf::from("/repo");
        assert_eq!(config.base_dir(&root), PathBuf::from("/repo/../worktrees"));
    }

    #[test]
    fn base_dir_honors_config() {
        let config = Config {
            worktree: Some(WorktreeSettings {
                defaults: Some(WorktreeDefaults { base_dir: Some(".wt".to_string()) }),
                hooks: None,
            }),
            ..Default::default()
        };
        let root = PathBuf::from("/repo");
        assert_eq!(config.base_dir(&root), PathBuf::from("/repo/.wt"));
    }
}
