//! Project-root resolution.
//!
//! Priority, highest first:
//!  1. explicit tool argument (`project_root`, `projectRoot`)
//!  2. environment (`PROJECT_PATH`, `WORKSPACE_PATH`)
//!  3. IDE metadata (`projectRoot`, `workspaceRoot`, `workspacePath`)

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::args::non_empty_str;
use crate::config::{load_config, Config};
use crate::error::RootError;
use crate::guard::absolutize;

pub const PROJECT_ROOT_ARGS: [&str; 2] = ["project_root", "projectRoot"];
pub const PROJECT_ROOT_ENV: [&str; 2] = ["PROJECT_PATH", "WORKSPACE_PATH"];
pub const IDE_META_KEYS: [&str; 3] = ["projectRoot", "workspaceRoot", "workspacePath"];
pub const VSCODE_WORKSPACE_ENV: &str = "VSCODE_WORKSPACE_FOLDER";

/// Workspace hints supplied by the client (or derived from `initialize`).
pub type IdeMetadata = Map<String, Value>;

/// Read-only view of the process environment, captured once so resolution is
/// deterministic and testable.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot(HashMap<String, String>);

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self(std::env::vars().collect())
    }

    /// Empty values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str()).filter(|s| !s.trim().is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Pick the highest-priority root candidate without touching the filesystem.
pub fn project_root_candidate<'a>(
    args: &'a Map<String, Value>,
    env: &'a EnvSnapshot,
    ide_meta: Option<&'a IdeMetadata>,
) -> Option<&'a str> {
    PROJECT_ROOT_ARGS
        .iter()
        .find_map(|k| args.get(*k).and_then(non_empty_str))
        .or_else(|| PROJECT_ROOT_ENV.iter().find_map(|k| env.get(k)))
        .or_else(|| {
            let meta = ide_meta?;
            IDE_META_KEYS.iter().find_map(|k| meta.get(*k).and_then(non_empty_str))
        })
}

/// Resolve an absolute, existing project directory.
///
/// Relative candidates are made absolute against `cwd` (the server's real
/// working directory) as the last step.
pub fn resolve_project_root(
    args: &Map<String, Value>,
    env: &EnvSnapshot,
    ide_meta: Option<&IdeMetadata>,
    cwd: &Path,
) -> Result<PathBuf, RootError> {
    let candidate = project_root_candidate(args, env, ide_meta).ok_or(RootError::Required)?;
    let abs = absolutize(Path::new(candidate.trim()), cwd);
    if !abs.is_dir() {
        return Err(RootError::Invalid(abs));
    }
    Ok(abs)
}

/// Strip a `file://` scheme from a client-supplied URI.
pub fn path_from_file_uri(uri: &str) -> Option<&str> {
    uri.strip_prefix("file://").filter(|p| !p.is_empty())
}

/// A bound project root together with everything derived from it.
///
/// Re-binding the root builds a fresh `Workspace`; existing ones are never
/// mutated in place.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    pub fn open(root: PathBuf, env: &EnvSnapshot) -> Self {
        let config = load_config(Some(&root), env);
        Self { root, config }
    }

    pub fn with_config(root: PathBuf, config: Config) -> Self {
        Self { root, config }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory name used as a display name for roots and generated docs.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.root.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn nothing_supplied_is_required_error() {
        let err = resolve_project_root(&Map::new(), &EnvSnapshot::default(), None, Path::new("/")).unwrap_err();
        assert_eq!(err, RootError::Required);
        assert!(err.to_string().starts_with("ProjectRootRequired"));
    }

    #[test]
    fn missing_directory_is_invalid_and_names_the_path() {
        let args = obj(json!({"project_root": "/nonexistent/xyz"}));
        let err = resolve_project_root(&args, &EnvSnapshot::default(), None, Path::new("/")).unwrap_err();
        assert_eq!(err, RootError::Invalid(PathBuf::from("/nonexistent/xyz")));
        assert!(err.to_string().contains("/nonexistent/xyz"));
    }

    #[test]
    fn a_file_is_not_a_project_root() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("build.gradle");
        std::fs::write(&file, "").unwrap();
        let args = obj(json!({"project_root": file}));
        let err = resolve_project_root(&args, &EnvSnapshot::default(), None, Path::new("/")).unwrap_err();
        assert!(matches!(err, RootError::Invalid(_)));
    }

    #[test]
    fn explicit_argument_resolves_exactly() {
        let tmp = TempDir::new().unwrap();
        let args = obj(json!({"project_root": tmp.path()}));
        let root = resolve_project_root(&args, &EnvSnapshot::default(), None, Path::new("/")).unwrap();
        assert_eq!(root, tmp.path());

        let camel = obj(json!({"projectRoot": tmp.path()}));
        let root = resolve_project_root(&camel, &EnvSnapshot::default(), None, Path::new("/")).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn priority_is_argument_then_env_then_ide() {
        let arg_dir = TempDir::new().unwrap();
        let env_dir = TempDir::new().unwrap();
        let ide_dir = TempDir::new().unwrap();

        let env: EnvSnapshot = [("PROJECT_PATH", env_dir.path().to_string_lossy().to_string())]
            .into_iter()
            .collect();
        let ide = obj(json!({"workspaceRoot": ide_dir.path()}));
        let args = obj(json!({"project_root": arg_dir.path()}));

        let cwd = Path::new("/");
        assert_eq!(resolve_project_root(&args, &env, Some(&ide), cwd).unwrap(), arg_dir.path());
        assert_eq!(resolve_project_root(&Map::new(), &env, Some(&ide), cwd).unwrap(), env_dir.path());
        assert_eq!(
            resolve_project_root(&Map::new(), &EnvSnapshot::default(), Some(&ide), cwd).unwrap(),
            ide_dir.path()
        );
    }

    #[test]
    fn second_env_name_and_ide_keys_are_accepted() {
        let tmp = TempDir::new().unwrap();
        let env: EnvSnapshot = [("WORKSPACE_PATH", tmp.path().to_string_lossy().to_string())]
            .into_iter()
            .collect();
        assert_eq!(resolve_project_root(&Map::new(), &env, None, Path::new("/")).unwrap(), tmp.path());

        for key in IDE_META_KEYS {
            let mut ide = IdeMetadata::new();
            ide.insert(key.to_string(), json!(tmp.path()));
            let root = resolve_project_root(&Map::new(), &EnvSnapshot::default(), Some(&ide), Path::new("/")).unwrap();
            assert_eq!(root, tmp.path(), "ide key {key}");
        }
    }

    #[test]
    fn empty_values_fall_through() {
        let tmp = TempDir::new().unwrap();
        let env: EnvSnapshot = [("PROJECT_PATH", ""), ("WORKSPACE_PATH", "")].into_iter().collect();
        let ide = obj(json!({"projectRoot": "", "workspacePath": tmp.path()}));
        let args = obj(json!({"project_root": ""}));
        let root = resolve_project_root(&args, &env, Some(&ide), Path::new("/")).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn relative_candidates_resolve_against_cwd() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("app")).unwrap();
        let args = obj(json!({"project_root": "app"}));
        let root = resolve_project_root(&args, &EnvSnapshot::default(), None, tmp.path()).unwrap();
        assert_eq!(root, tmp.path().join("app"));
        assert!(root.is_absolute());
    }

    #[test]
    fn file_uris_are_stripped() {
        assert_eq!(path_from_file_uri("file:///home/dev/app"), Some("/home/dev/app"));
        assert_eq!(path_from_file_uri("https://example.com"), None);
        assert_eq!(path_from_file_uri("file://"), None);
    }
}
