//! Path containment checks shared by every path-scoped tool.

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

use crate::error::RootError;

/// Join `path` onto `base` when relative, then fold `.` and `..` lexically.
///
/// Purely lexical: symlinks are not resolved and `..` above the filesystem
/// root is dropped.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut out = PathBuf::new();
    for comp in joined.components() {
        match comp {
            Component::Prefix(_) | Component::RootDir => out.push(comp.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Holds the server's working directory as captured at startup.
#[derive(Debug, Clone)]
pub struct PathGuard {
    server_cwd: PathBuf,
}

impl PathGuard {
    pub fn new(server_cwd: impl Into<PathBuf>) -> Self {
        let server_cwd = server_cwd.into();
        let server_cwd = absolutize(&server_cwd, Path::new("/"));
        Self { server_cwd }
    }

    /// Snapshot the process working directory. Call once, at startup.
    pub fn capture() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current dir")?;
        Ok(Self::new(cwd))
    }

    pub fn server_cwd(&self) -> &Path {
        &self.server_cwd
    }

    /// Reject `path` when it resolves to the server's own working directory.
    pub fn assert_not_server_cwd(&self, path: &Path) -> Result<(), RootError> {
        let abs = absolutize(path, &self.server_cwd);
        if abs == self.server_cwd {
            return Err(RootError::ServerCwdMisuse(abs));
        }
        Ok(())
    }
}

/// Resolve `file_path` (absolute or root-relative) and require it to be the
/// project root itself or nested under it.
///
/// Containment is checked per path component, so `/root2` is never accepted
/// under `/root`.
pub fn validate_path_under_project(file_path: &str, project_root: &Path) -> Result<PathBuf, RootError> {
    let root = if project_root.is_absolute() {
        absolutize(project_root, Path::new("/"))
    } else {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        absolutize(project_root, &cwd)
    };
    let abs = absolutize(Path::new(file_path), &root);

    if abs.starts_with(&root) {
        Ok(abs)
    } else {
        Err(RootError::OutsideProject {
            path: file_path.to_string(),
            root,
        })
    }
}

/// True when `path` (after symlink resolution) lies within one of `roots`.
pub fn is_path_allowed(path: &Path, roots: &[PathBuf]) -> bool {
    let Ok(resolved) = path.canonicalize() else {
        return false;
    };
    roots.iter().any(|root| {
        root.canonicalize()
            .map(|r| resolved.starts_with(&r))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn absolutize_folds_dots() {
        let base = Path::new("/work/project");
        assert_eq!(absolutize(Path::new("src/./main.kt"), base), PathBuf::from("/work/project/src/main.kt"));
        assert_eq!(absolutize(Path::new("../other"), base), PathBuf::from("/work/other"));
        assert_eq!(absolutize(Path::new("/a/b/../c"), base), PathBuf::from("/a/c"));
        assert_eq!(absolutize(Path::new("../../../.."), base), PathBuf::from("/"));
    }

    #[test]
    fn server_cwd_is_rejected() {
        let guard = PathGuard::new("/srv/kotlin-mcp");
        let err = guard.assert_not_server_cwd(Path::new("/srv/kotlin-mcp")).unwrap_err();
        assert!(matches!(err, RootError::ServerCwdMisuse(_)));
        assert!(err.to_string().starts_with("ServerCwdMisuse"));

        // Relative spellings of the same directory are caught too.
        assert!(guard.assert_not_server_cwd(Path::new(".")).is_err());
        assert!(guard.assert_not_server_cwd(Path::new("/srv/kotlin-mcp/sub/..")).is_err());
    }

    #[test]
    fn other_paths_pass_the_cwd_guard() {
        let guard = PathGuard::new("/srv/kotlin-mcp");
        let tmp = TempDir::new().unwrap();
        assert!(guard.assert_not_server_cwd(tmp.path()).is_ok());
        assert!(guard.assert_not_server_cwd(Path::new("/srv/kotlin-mcp/app")).is_ok());
    }

    #[test]
    fn traversal_outside_project_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = validate_path_under_project("../../etc/passwd", tmp.path()).unwrap_err();
        assert!(matches!(err, RootError::OutsideProject { .. }));
        assert!(err.to_string().contains("outside project root"));

        assert!(validate_path_under_project("/etc/passwd", tmp.path()).is_err());
    }

    #[test]
    fn nested_paths_resolve_under_root() {
        let tmp = TempDir::new().unwrap();
        let p = validate_path_under_project("src/main.kt", tmp.path()).unwrap();
        assert!(p.starts_with(tmp.path()));
        assert_eq!(p, tmp.path().join("src/main.kt"));

        let root_itself = validate_path_under_project(".", tmp.path()).unwrap();
        assert_eq!(root_itself, tmp.path());

        let back_in = validate_path_under_project("src/../app/build.gradle", tmp.path()).unwrap();
        assert_eq!(back_in, tmp.path().join("app/build.gradle"));
    }

    #[test]
    fn sibling_with_shared_prefix_is_not_contained() {
        let root = Path::new("/data/root");
        assert!(validate_path_under_project("/data/root2/file.kt", root).is_err());
        assert!(validate_path_under_project("../root2/file.kt", root).is_err());
        assert!(validate_path_under_project("/data/root/file.kt", root).is_ok());
    }

    #[test]
    fn allowed_roots_use_resolved_paths() {
        let tmp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let file = tmp.path().join("build.gradle");
        std::fs::write(&file, "// build").unwrap();
        let outside = other.path().join("secret.txt");
        std::fs::write(&outside, "secret").unwrap();

        let roots = vec![tmp.path().to_path_buf()];
        assert!(is_path_allowed(&file, &roots));
        assert!(!is_path_allowed(&outside, &roots));
        assert!(!is_path_allowed(&tmp.path().join("missing.txt"), &roots));
        assert!(!is_path_allowed(&tmp.path().join("../").join(other.path().file_name().unwrap()).join("secret.txt"), &roots));
    }
}
