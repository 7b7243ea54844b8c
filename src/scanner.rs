use anyhow::{Context, Result};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Directories that are never worth scanning in an Android/Gradle project.
const NOISE_DIRS: [&str; 11] = [
    ".git",
    ".gradle",
    ".idea",
    ".cxx",
    ".externalNativeBuild",
    ".kotlin",
    "build",
    "out",
    "captures",
    "node_modules",
    "intermediates",
];

fn android_default_overrides(root: &Path, exclude_dir_names: &[String]) -> Result<Override> {
    let mut ob = OverrideBuilder::new(root);

    // Binary artifacts and images.
    for ext in ["apk", "aab", "aar", "jar", "class", "dex", "so", "keystore", "jks", "png", "jpg", "jpeg", "webp", "gif", "ico"] {
        ob.add(&format!("!**/*.{ext}"))?;
    }

    // Cover both the directory entry and its descendants so the walker never descends.
    let extra = exclude_dir_names
        .iter()
        .map(|d| d.trim().trim_matches('/'))
        .filter(|d| !d.is_empty());
    for d in NOISE_DIRS.into_iter().chain(extra) {
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    Ok(ob.build()?)
}

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub abs_path: PathBuf,
    pub rel_path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub root: PathBuf,
    /// File or directory to scan, relative to `root` unless absolute.
    pub target: PathBuf,
    pub max_file_bytes: u64,
    pub exclude_dir_names: Vec<String>,
    /// Lower-case extensions to keep (without dot). Empty keeps everything.
    pub extensions: Vec<String>,
}

impl ScanOptions {
    pub fn for_project(root: &Path, config: &Config) -> Self {
        Self {
            root: root.to_path_buf(),
            target: PathBuf::from("."),
            max_file_bytes: config.effective_max_file_bytes(),
            exclude_dir_names: config.scan.exclude_dir_names.clone(),
            extensions: vec![],
        }
    }

    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_extensions(mut self, exts: &[&str]) -> Self {
        self.extensions = exts.iter().map(|e| e.to_ascii_lowercase()).collect();
        self
    }

    pub fn target_root(&self) -> PathBuf {
        if self.target.is_absolute() {
            self.target.clone()
        } else {
            self.root.join(&self.target)
        }
    }

    fn wants(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

/// Walk the target honoring `.gitignore`, the built-in noise list and the
/// configured exclusions. Results are sorted by relative path.
pub fn scan_project(opts: &ScanOptions) -> Result<Vec<FileEntry>> {
    let target_root = opts.target_root();

    let meta = std::fs::metadata(&target_root)
        .with_context(|| format!("Target does not exist: {}", target_root.display()))?;

    let overrides = android_default_overrides(&opts.root, &opts.exclude_dir_names)?;

    if meta.is_file() {
        if overrides.matched(&target_root, false).is_ignore() || !opts.wants(&target_root) {
            return Ok(vec![]);
        }
        return Ok(entry_for(&opts.root, target_root, meta.len(), opts.max_file_bytes)
            .into_iter()
            .collect());
    }

    let walker = WalkBuilder::new(&target_root)
        .standard_filters(true) // .gitignore, .ignore, hidden, etc.
        .overrides(overrides)
        .build();

    let mut entries = Vec::new();
    for item in walker {
        let Ok(dent) = item else { continue };

        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        if !opts.wants(dent.path()) {
            continue;
        }

        let Ok(bytes) = dent.metadata().map(|m| m.len()) else { continue };
        if let Some(entry) = entry_for(&opts.root, dent.into_path(), bytes, opts.max_file_bytes) {
            entries.push(entry);
        }
    }

    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(entries)
}

fn entry_for(root: &Path, abs_path: PathBuf, bytes: u64, max_file_bytes: u64) -> Option<FileEntry> {
    if bytes == 0 || bytes > max_file_bytes {
        return None;
    }
    let rel_path = abs_path.strip_prefix(root).ok()?.to_path_buf();
    Some(FileEntry {
        abs_path,
        rel_path,
        bytes,
    })
}

/// Forward-slash relative path for display in tool results.
pub fn display_rel(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, text: &str) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, text).unwrap();
    }

    #[test]
    fn skips_build_output_and_configured_dirs() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app/src/main/java/Main.kt", "fun main() {}");
        write(tmp.path(), "app/build/generated/R.kt", "object R");
        write(tmp.path(), "generated/Gen.kt", "object Gen");
        write(tmp.path(), "app/libs/sdk.jar", "PK");

        let mut cfg = Config::default();
        cfg.scan.exclude_dir_names = vec!["generated".to_string()];
        let files = scan_project(&ScanOptions::for_project(tmp.path(), &cfg)).unwrap();
        let rels: Vec<String> = files.iter().map(|f| display_rel(&f.rel_path)).collect();
        assert_eq!(rels, vec!["app/src/main/java/Main.kt"]);
    }

    #[test]
    fn extension_filter_and_empty_files() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a/Main.kt", "fun main() {}");
        write(tmp.path(), "a/Util.java", "class Util {}");
        write(tmp.path(), "a/Empty.kt", "");

        let opts = ScanOptions::for_project(tmp.path(), &Config::default()).with_extensions(&["kt"]);
        let files = scan_project(&opts).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(display_rel(&files[0].rel_path), "a/Main.kt");
    }

    #[test]
    fn single_file_target() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/A.kt", "class A");
        let opts = ScanOptions::for_project(tmp.path(), &Config::default()).with_target("src/A.kt");
        let files = scan_project(&opts).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].bytes, 7);

        let missing = ScanOptions::for_project(tmp.path(), &Config::default()).with_target("nope");
        assert!(scan_project(&missing).is_err());
    }
}
