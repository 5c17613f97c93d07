//! Task DAG builder (§4.C): turns a `dependsOn` spec plus the workspace graph
//! into per-package task nodes, the inner DAG a workspace-script step runs.

use std::collections::{HashMap, HashSet};

use crate::dag::Node;
use crate::workspace::WorkspacePackage;

/// One `(package, script)` unit, the thing a workspace-script step executes.
///
/// `id` is `"PKG#SCRIPT"`, stored alongside the logical fields since
/// `Node::id` borrows from `self` and can't construct a `String` on the fly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    pub package_name: String,
    pub package_path: std::path::PathBuf,
    pub script: String,
    pub dependencies: Vec<String>,
    id: String,
}

impl TaskNode {
    pub fn task_id(&self) -> &str {
        &self.id
    }
}

impl Node for TaskNode {
    fn id(&self) -> &str {
        &self.id
    }
    fn deps(&self) -> &[String] {
        &self.dependencies
    }
}

/// Build the per-package task nodes for `script`, given the dependency spec
/// strings from the step's `WorkspaceScriptAction.dependsOn` and the set of
/// discovered packages plus their workspace-dependency graph.
///
/// - `^task`: fan out to `D#script` for every immediate workspace dependency
///   `D` of each candidate package that itself has `script`.
/// - `pkg#task`: include that exact task id if `pkg` exists and has `task`.
/// - bare `task`: reserved for same-package-task semantics; a no-op here, as
///   specified.
pub fn build(
    script: &str,
    depends_on: &[String],
    packages: &[WorkspacePackage],
    pkg_graph: &HashMap<String, Vec<String>>,
) -> Vec<TaskNode> {
    let candidates: Vec<&WorkspacePackage> = packages
        .iter()
        .filter(|p| p.scripts.contains_key(script))
        .collect();

    let has_caret = depends_on.iter().any(|s| s.starts_with('^'));
    let specific_deps: Vec<(&str, &str)> = depends_on
        .iter()
        .filter_map(|s| s.split_once('#'))
        .collect();

    let by_name: HashMap<&str, &WorkspacePackage> =
        packages.iter().map(|p| (p.name.as_str(), p)).collect();

    let mut nodes = Vec::with_capacity(candidates.len());
    for pkg in &candidates {
        let mut deps: HashSet<String> = HashSet::new();

        if has_caret {
            for dep_name in pkg_graph.get(&pkg.name).into_iter().flatten() {
                if let Some(dep_pkg) = by_name.get(dep_name.as_str())
                    && dep_pkg.scripts.contains_key(script)
                {
                    deps.insert(format!("{dep_name}#{script}"));
                }
            }
        }

        for (x, y) in &specific_deps {
            if let Some(x_pkg) = by_name.get(*x)
                && x_pkg.scripts.contains_key(*y)
            {
                deps.insert(format!("{x}#{y}"));
            }
        }

        nodes.push(TaskNode {
            package_name: pkg.name.clone(),
            package_path: pkg.path.clone(),
            script: script.to_string(),
            dependencies: deps.into_iter().collect(),
            id: format!("{}#{script}", pkg.name),
        });
    }

    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn pkg(name: &str, scripts: &[&str]) -> WorkspacePackage {
        WorkspacePackage {
            name: name.to_string(),
            path: PathBuf::from(name),
            scripts: scripts
                .iter()
                .map(|s| (s.to_string(), "run".to_string()))
                .collect(),
            workspace_deps: Vec::new(),
        }
    }

    #[test]
    fn caret_dependency_fans_out_to_workspace_deps() {
        let engine = pkg("engine", &["test"]);
        let internals = pkg("internals", &["test"]);
        let hcl = pkg("hcl", &["test"]);
        let packages = vec![engine, internals, hcl];
        let mut graph = HashMap::new();
        graph.insert("engine".to_string(), vec!["internals".to_string()]);
        graph.insert("hcl".to_string(), vec!["internals".to_string()]);
        graph.insert("internals".to_string(), vec![]);

        let nodes = build("test", &["^test".to_string()], &packages, &graph);
        assert_eq!(nodes.len(), 3);

        let engine_node = nodes.iter().find(|n| n.package_name == "engine").unwrap();
        assert_eq!(engine_node.dependencies, vec!["internals#test".to_string()]);
        let hcl_node = nodes.iter().find(|n| n.package_name == "hcl").unwrap();
        assert_eq!(hcl_node.dependencies, vec!["internals#test".to_string()]);
        let internals_node = nodes
            .iter()
            .find(|n| n.package_name == "internals")
            .unwrap();
        assert!(internals_node.dependencies.is_empty());
    }

    #[test]
    fn specific_dependency_included_when_present() {
        let a = pkg("a", &["build"]);
        let b = pkg("b", &["build", "lint"]);
        let packages = vec![a, b];
        let graph = HashMap::new();

        let nodes = build("build", &["b#lint".to_string()], &packages, &graph);
        let a_node = nodes.iter().find(|n| n.package_name == "a").unwrap();
        assert_eq!(a_node.dependencies, vec!["b#lint".to_string()]);
    }

    #[test]
    fn specific_dependency_skipped_when_script_missing() {
        let a = pkg("a", &["build"]);
        let b = pkg("b", &["build"]);
        let packages = vec![a, b];
        let graph = HashMap::new();

        let nodes = build("build", &["b#lint".to_string()], &packages, &graph);
        let a_node = nodes.iter().find(|n| n.package_name == "a").unwrap();
        assert!(a_node.dependencies.is_empty());
    }

    #[test]
    fn only_candidates_with_the_script_are_emitted() {
        let a = pkg("a", &["build"]);
        let b = pkg("b", &["lint"]);
        let packages = vec![a, b];
        let graph = HashMap::new();

        let nodes = build("build", &[], &packages, &graph);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].package_name, "a");
    }
}
