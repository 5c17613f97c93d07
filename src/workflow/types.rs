//! Workflow data model (§3): Workflow, Step, Action, and the action payloads.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use thiserror::Error;

/// A named collection of steps executed as one job.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub steps: Vec<Step>,
}

/// Raw shape a workflow takes in config: either a bare array of steps, or a
/// record `{steps: [...]}`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawWorkflow {
    Steps(Vec<RawStep>),
    Record { steps: Vec<RawStep> },
}

impl TryFrom<RawWorkflow> for Workflow {
    type Error = StepError;

    fn try_from(raw: RawWorkflow) -> Result<Self, StepError> {
        let raw_steps = match raw {
            RawWorkflow::Steps(s) => s,
            RawWorkflow::Record { steps } => steps,
        };
        let steps = raw_steps
            .into_iter()
            .map(Step::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        for step in &steps {
            if step.name.is_empty() {
                return Err(StepError::EmptyName);
            }
            if !seen.insert(step.name.clone()) {
                return Err(StepError::DuplicateName(step.name.clone()));
            }
        }
        for step in &steps {
            for dep in &step.depends_on {
                if !seen.contains(dep) {
                    return Err(StepError::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        Ok(Workflow { steps })
    }
}

/// One unit of work in a workflow.
#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub description: Option<String>,
    pub depends_on: Vec<String>,
    pub branches: Vec<String>,
    pub action: Action,
}

/// The concrete effect of a step: exactly one of a shell command, a
/// worktree-copy, or a workspace-script run across packages.
#[derive(Debug, Clone)]
pub enum Action {
    Cmd(String),
    WorktreeCp(WorktreeCpAction),
    WorkspaceScript(WorkspaceScriptAction),
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WorktreeCpAction {
    pub from: String,
    pub files: Vec<String>,
    #[serde(default)]
    pub allow_missing: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WorkspaceScriptAction {
    pub script: String,
    #[serde(default, rename = "timeout")]
    pub timeout_ms: Option<u64>,
    #[serde(default, rename = "dependsOn")]
    pub depends_on: Vec<String>,
}

impl WorkspaceScriptAction {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Wire shape of a step before action-arity validation.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RawStep {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "dependsOn")]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default, rename = "worktree:cp")]
    pub worktree_cp: Option<WorktreeCpAction>,
    #[serde(default)]
    pub bun: Option<WorkspaceScriptAction>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("step has an empty name")]
    EmptyName,
    #[error("duplicate step name \"{0}\"")]
    DuplicateName(String),
    #[error("step \"{step}\" depends on unknown step \"{dependency}\"")]
    UnknownDependency { step: String, dependency: String },
    #[error("step \"{0}\" has no action (expected one of: cmd, worktree:cp, bun)")]
    NoAction(String),
    #[error(
        "step \"{0}\" has more than one action; exactly one of cmd, worktree:cp, bun is required"
    )]
    MultipleActions(String),
}

impl TryFrom<RawStep> for Step {
    type Error = StepError;

    fn try_from(raw: RawStep) -> Result<Self, StepError> {
        let present = [
            raw.cmd.is_some(),
            raw.worktree_cp.is_some(),
            raw.bun.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count();

        let action = match present {
            0 => return Err(StepError::NoAction(raw.name)),
            1 => {
                if let Some(cmd) = raw.cmd {
                    Action::Cmd(cmd)
                } else if let Some(cp) = raw.worktree_cp {
                    Action::WorktreeCp(cp)
                } else {
                    Action::WorkspaceScript(raw.bun.expect("checked present == 1"))
                }
            }
            _ => return Err(StepError::MultipleActions(raw.name)),
        };

        Ok(Step {
            name: raw.name,
            description: raw.description,
            depends_on: raw.depends_on,
            branches: raw.branches,
            action,
        })
    }
}

/// Mutable per-run state owned by the Step Scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct StepState {
    pub status: StepStatus,
    pub duration_ms: Option<u64>,
    pub output: String,
    pub step: Step,
}

impl StepState {
    pub fn new(step: Step, status: StepStatus) -> Self {
        Self {
            status,
            duration_ms: None,
            output: String::new(),
            step,
        }
    }
}

/// Result returned by an action executor.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub success: bool,
    pub output: String,
    pub duration_ms: u64,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub wall_clock_ms: u64,
}

/// A worktree as reported by `git worktree list --porcelain`.
#[derive(Debug, Clone)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub branch: String,
    pub is_main: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_json(name: &str, action: &str, depends_on: &[&str]) -> String {
        let deps = depends_on
            .iter()
            .map(|d| format!("\"{d}\""))
            .collect::<Vec<_>>()
            .join(",");
        format!(r#"{{"name":"{name}","dependsOn":[{deps}],{action}}}"#)
    }

    #[test]
    fn zero_actions_is_an_error() {
        let raw: RawStep = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(Step::try_from(raw).unwrap_err(), StepError::NoAction("x".into()));
    }

    #[test]
    fn two_actions_is_an_error() {
        let raw: RawStep =
            serde_json::from_str(r#"{"name":"x","cmd":"echo hi","bun":{"script":"build"}}"#)
                .unwrap();
        assert_eq!(
            Step::try_from(raw).unwrap_err(),
            StepError::MultipleActions("x".into())
        );
    }

    #[test]
    fn single_action_parses() {
        let json = step_json("lint", r#""cmd":"echo lint""#, &[]);
        let raw: RawStep = serde_json::from_str(&json).unwrap();
        let step = Step::try_from(raw).unwrap();
        assert!(matches!(step.action, Action::Cmd(ref c) if c == "echo lint"));
    }

    #[test]
    fn unknown_dependency_rejected() {
        let json = format!(
            r#"[{}]"#,
            step_json("build", r#""cmd":"echo build""#, &["lint"])
        );
        let raw: RawWorkflow = serde_json::from_str(&json).unwrap();
        let err = Workflow::try_from(raw).unwrap_err();
        assert_eq!(
            err,
            StepError::UnknownDependency {
                step: "build".into(),
                dependency: "lint".into()
            }
        );
    }

    #[test]
    fn duplicate_name_rejected() {
        let json = format!(
            "[{},{}]",
            step_json("lint", r#""cmd":"echo lint""#, &[]),
            step_json("lint", r#""cmd":"echo lint2""#, &[])
        );
        let raw: RawWorkflow = serde_json::from_str(&json).unwrap();
        assert_eq!(
            Workflow::try_from(raw).unwrap_err(),
            StepError::DuplicateName("lint".into())
        );
    }
}
