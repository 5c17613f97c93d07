//! Step DAG Resolver (§4.E): resolves requested step names to the closed set
//! of transitive dependencies, preserving declaration order, detecting cycles.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::types::{Step, Workflow};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Step \"{0}\" not found")]
    NotFound(String),
    #[error("Cycle involving \"{0}\"")]
    Cycle(String),
}

/// Resolve `requested_names` to the closed set of steps needed to run them,
/// in the declaration order of `workflow.steps`.
pub fn resolve(workflow: &Workflow, requested_names: &[String]) -> Result<Vec<Step>, ResolveError> {
    let by_name: HashMap<&str, &Step> =
        workflow.steps.iter().map(|s| (s.name.as_str(), s)).collect();

    let mut collected: HashSet<String> = HashSet::new();
    let mut visiting: HashSet<String> = HashSet::new();

    for name in requested_names {
        visit(name, &by_name, &mut collected, &mut visiting)?;
    }

    Ok(workflow
        .steps
        .iter()
        .filter(|s| collected.contains(&s.name))
        .cloned()
        .collect())
}

fn visit(
    name: &str,
    by_name: &HashMap<&str, &Step>,
    collected: &mut HashSet<String>,
    visiting: &mut HashSet<String>,
) -> Result<(), ResolveError> {
    if collected.contains(name) {
        return Ok(());
    }
    let Some(step) = by_name.get(name) else {
        return Err(ResolveError::NotFound(name.to_string()));
    };
    if !visiting.insert(name.to_string()) {
        return Err(ResolveError::Cycle(name.to_string()));
    }

    for dep in &step.depends_on {
        visit(dep, by_name, collected, visiting)?;
    }

    visiting.remove(name);
    collected.insert(name.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{Action, Step};

    fn step(name: &str, depends_on: &[&str]) -> Step {
        Step {
            name: name.to_string(),
            description: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            branches: Vec::new(),
            action: Action::Cmd("true".to_string()),
        }
    }

    fn names(steps: &[Step]) -> Vec<String> {
        steps.iter().map(|s| s.name.clone()).collect()
    }

    #[test]
    fn no_cycles_no_filters_returns_all_in_declaration_order() {
        let wf = Workflow {
            steps: vec![step("lint", &[]), step("build", &["lint"]), step("test", &["build"])],
        };
        let all: Vec<String> = wf.steps.iter().map(|s| s.name.clone()).collect();
        let resolved = resolve(&wf, &all).unwrap();
        assert_eq!(names(&resolved), vec!["lint", "build", "test"]);
    }

    #[test]
    fn transitive_deps_resolved_in_declaration_order() {
        let wf = Workflow {
            steps: vec![step("lint", &[]), step("build", &["lint"]), step("test", &["build"])],
        };
        let resolved = resolve(&wf, &["test".to_string()]).unwrap();
        assert_eq!(names(&resolved), vec!["lint", "build", "test"]);
    }

    #[test]
    fn multiple_requests_deduplicate() {
        let wf = Workflow {
            steps: vec![step("lint", &[]), step("build", &["lint"]), step("test", &["build"])],
        };
        let resolved = resolve(&wf, &["build".to_string(), "test".to_string()]).unwrap();
        assert_eq!(names(&resolved), vec!["lint", "build", "test"]);
    }

    #[test]
    fn unknown_name_errors() {
        let wf = Workflow { steps: vec![step("lint", &[])] };
        assert_eq!(
            resolve(&wf, &["missing".to_string()]).unwrap_err(),
            ResolveError::NotFound("missing".to_string())
        );
    }

    #[test]
    fn cycle_errors() {
        let wf = Workflow {
            steps: vec![step("a", &["b"]), step("b", &["a"])],
        };
        let err = resolve(&wf, &["a".to_string()]).unwrap_err();
        assert!(matches!(err, ResolveError::Cycle(_)));
    }
}
