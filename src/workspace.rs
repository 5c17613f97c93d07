//! Workspace discovery (§4.B): expand workspace globs, read package
//! manifests, build the package -> workspace-deps map.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

/// A discovered workspace package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePackage {
    pub name: String,
    pub path: PathBuf,
    pub scripts: HashMap<String, String>,
    /// Names of other discovered packages this one depends on.
    pub workspace_deps: Vec<String>,
}

const MANIFEST_FILE: &str = "package.json";

/// Discover all workspace packages rooted at `root_dir`.
///
/// Reads `root_dir/package.json`'s `workspaces` field (either a plain array
/// of glob patterns, or `{"packages": [...]}`), expands each pattern as a
/// directory glob, and reads every matched package's manifest. A matched
/// directory missing a manifest, missing a `name`, or holding unreadable JSON
/// is silently skipped. Missing the root manifest itself fails discovery.
pub fn discover(root_dir: &Path) -> Result<Vec<WorkspacePackage>> {
    let root_manifest_path = root_dir.join(MANIFEST_FILE);
    let root_manifest = read_manifest(&root_manifest_path)
        .with_context(|| format!("No workspace manifest at {}", root_manifest_path.display()))?;

    let patterns = workspace_patterns(&root_manifest);

    // First pass: expand globs and register name -> path for every manifest
    // that successfully parses and names itself.
    let mut registered: HashMap<String, PathBuf> = HashMap::new();
    let mut manifests: HashMap<String, Value> = HashMap::new();

    for pattern in &patterns {
        let full_pattern = root_dir.join(pattern).to_string_lossy().to_string();
        let entries = match glob::glob(&full_pattern) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            if !entry.is_dir() {
                continue;
            }
            let manifest_path = entry.join(MANIFEST_FILE);
            let Ok(manifest) = read_manifest(&manifest_path) else {
                continue;
            };
            let Some(name) = manifest.get("name").and_then(Value::as_str) else {
                continue;
            };
            registered.insert(name.to_string(), entry.clone());
            manifests.insert(name.to_string(), manifest);
        }
    }

    // Second pass: resolve scripts and workspace-local dependencies.
    let mut packages = Vec::with_capacity(registered.len());
    for (name, path) in &registered {
        let manifest = &manifests[name];
        let scripts = manifest
            .get("scripts")
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let mut dep_names: HashSet<&str> = HashSet::new();
        for field in ["dependencies", "devDependencies", "optionalDependencies"] {
            if let Some(deps) = manifest.get(field).and_then(Value::as_object) {
                dep_names.extend(deps.keys().map(String::as_str));
            }
        }

        let workspace_deps: Vec<String> = dep_names
            .into_iter()
            .filter(|d| registered.contains_key(*d))
            .map(String::from)
            .collect();

        packages.push(WorkspacePackage {
            name: name.clone(),
            path: path.clone(),
            scripts,
            workspace_deps,
        });
    }

    Ok(packages)
}

fn read_manifest(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| anyhow!("invalid manifest JSON: {e}"))
}

fn workspace_patterns(root_manifest: &Value) -> Vec<String> {
    match root_manifest.get("workspaces") {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        Some(Value::Object(obj)) => obj
            .get("packages")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Build a package-name -> workspace-deps map, the shape the task DAG builder
/// consults to fan `^task` out through immediate dependencies.
pub fn dependency_graph(packages: &[WorkspacePackage]) -> HashMap<String, Vec<String>> {
    packages
        .iter()
        .map(|p| (p.name.clone(), p.workspace_deps.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, contents: &str) {
        fs::write(dir.join(MANIFEST_FILE), contents).unwrap();
    }

    #[test]
    fn discovers_packages_and_workspace_deps() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_manifest(
            root,
            r#"{"name":"root","workspaces":["packages/*"]}"#,
        );
        fs::create_dir_all(root.join("packages/engine")).unwrap();
        fs::create_dir_all(root.join("packages/internals")).unwrap();
        write_manifest(
            &root.join("packages/engine"),
            r#"{"name":"engine","scripts":{"test":"run-tests"},"dependencies":{"internals":"*"}}"#,
        );
        write_manifest(
            &root.join("packages/internals"),
            r#"{"name":"internals","scripts":{"test":"run-tests"}}"#,
        );

        let mut packages = discover(root).unwrap();
        packages.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "engine");
        assert_eq!(packages[0].workspace_deps, vec!["internals".to_string()]);
        assert_eq!(packages[1].name, "internals");
        assert!(packages[1].workspace_deps.is_empty());
    }

    #[test]
    fn missing_root_manifest_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(discover(tmp.path()).is_err());
    }

    #[test]
    fn skips_unreadable_or_unnamed_packages() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_manifest(root, r#"{"name":"root","workspaces":["packages/*"]}"#);
        fs::create_dir_all(root.join("packages/broken")).unwrap();
        fs::write(root.join("packages/broken/package.json"), "not json").unwrap();
        fs::create_dir_all(root.join("packages/noname")).unwrap();
        write_manifest(&root.join("packages/noname"), r#"{"scripts":{}}"#);

        let packages = discover(root).unwrap();
        assert!(packages.is_empty());
    }

    #[test]
    fn workspaces_packages_object_form() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_manifest(
            root,
            r#"{"name":"root","workspaces":{"packages":["pkgs/*"]}}"#,
        );
        fs::create_dir_all(root.join("pkgs/a")).unwrap();
        write_manifest(&root.join("pkgs/a"), r#"{"name":"a"}"#);

        let packages = discover(root).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "a");
    }
}
