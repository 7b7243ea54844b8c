use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::project::EnvSnapshot;

/// Per-project config file, looked up in the bound project root.
pub const CONFIG_FILE_NAME: &str = ".kotlin-mcp.json";

/// Hard ceiling for file-scanning tools, regardless of config.
pub const ABSOLUTE_MAX_FILE_BYTES: u64 = 2_000_000;

/// Controls project scanning behavior (what to skip).
///
/// Note: `.gitignore` is always respected by the scanner; these are additional
/// hard skips on top of the built-in Android build directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory *names* to skip anywhere in the tree (e.g. "generated").
    pub exclude_dir_names: Vec<String>,
    /// Files larger than this are skipped by search and classification tools.
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_dir_names: vec![],
            max_file_bytes: 512 * 1024,
        }
    }
}

/// External executor for tools without a built-in handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarConfig {
    /// argv of the sidecar process. Empty disables the delegate.
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            command: vec![],
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchLogConfig {
    pub enabled: bool,
    /// Defaults to `~/.kotlin-mcp/dispatch.jsonl`.
    pub path: Option<PathBuf>,
}

impl Default for DispatchLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl DispatchLogConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        self.path
            .clone()
            .or_else(|| dirs::home_dir().map(|h| h.join(".kotlin-mcp").join("dispatch.jsonl")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// MCP level name (`debug`, `info`, `warning`, ...).
    pub log_level: String,
    /// Upper bound for build, test, docs and format subprocesses.
    pub command_timeout_secs: u64,
    pub git_timeout_secs: u64,
    pub scan: ScanConfig,
    pub sidecar: SidecarConfig,
    pub dispatch_log: DispatchLogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            command_timeout_secs: 600,
            git_timeout_secs: 60,
            scan: ScanConfig::default(),
            sidecar: SidecarConfig::default(),
            dispatch_log: DispatchLogConfig::default(),
        }
    }
}

impl Config {
    pub fn effective_max_file_bytes(&self) -> u64 {
        self.scan.max_file_bytes.min(ABSOLUTE_MAX_FILE_BYTES)
    }

    fn apply_env(&mut self, env: &EnvSnapshot) {
        if let Some(level) = env.get("MCP_LOG_LEVEL") {
            self.log_level = level.trim().to_lowercase();
        }
        if let Some(secs) = env.get("MCP_COMMAND_TIMEOUT_SECS").and_then(|s| s.trim().parse().ok()) {
            self.command_timeout_secs = secs;
        }
        if let Some(secs) = env.get("MCP_GIT_TIMEOUT_SECS").and_then(|s| s.trim().parse().ok()) {
            self.git_timeout_secs = secs;
        }
        if let Some(cmd) = env.get("MCP_SIDECAR_CMD") {
            self.sidecar.command = cmd.split_whitespace().map(str::to_string).collect();
        }
        if let Some(log) = env.get("MCP_DISPATCH_LOG") {
            let log = log.trim();
            if log.eq_ignore_ascii_case("off") {
                self.dispatch_log.enabled = false;
            } else {
                self.dispatch_log.enabled = true;
                self.dispatch_log.path = Some(PathBuf::from(log));
            }
        }
    }
}

/// Load `.kotlin-mcp.json` from `project_root` (if any), then apply environment
/// overrides. A missing or unparsable file yields defaults.
pub fn load_config(project_root: Option<&Path>, env: &EnvSnapshot) -> Config {
    let mut cfg = project_root
        .map(|root| root.join(CONFIG_FILE_NAME))
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|text| match serde_json::from_str::<Config>(&text) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed {CONFIG_FILE_NAME}");
                None
            }
        })
        .unwrap_or_default();
    cfg.apply_env(env);
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_file() {
        let cfg = load_config(None, &EnvSnapshot::default());
        assert_eq!(cfg.command_timeout_secs, 600);
        assert_eq!(cfg.git_timeout_secs, 60);
        assert!(cfg.sidecar.command.is_empty());
        assert!(cfg.dispatch_log.enabled);
    }

    #[test]
    fn file_values_are_partial() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"{"git_timeout_secs": 5, "scan": {"exclude_dir_names": ["generated"]}}"#,
        )
        .unwrap();
        let cfg = load_config(Some(tmp.path()), &EnvSnapshot::default());
        assert_eq!(cfg.git_timeout_secs, 5);
        assert_eq!(cfg.command_timeout_secs, 600);
        assert_eq!(cfg.scan.exclude_dir_names, vec!["generated"]);
        assert_eq!(cfg.scan.max_file_bytes, 512 * 1024);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
        let cfg = load_config(Some(tmp.path()), &EnvSnapshot::default());
        assert_eq!(cfg.git_timeout_secs, 60);
    }

    #[test]
    fn env_overrides_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE_NAME), r#"{"command_timeout_secs": 10}"#).unwrap();
        let env: EnvSnapshot = [
            ("MCP_COMMAND_TIMEOUT_SECS", "42"),
            ("MCP_SIDECAR_CMD", "kotlin-sidecar  --stdio --quiet"),
            ("MCP_DISPATCH_LOG", "off"),
            ("MCP_LOG_LEVEL", "DEBUG"),
        ]
        .into_iter()
        .collect();
        let cfg = load_config(Some(tmp.path()), &env);
        assert_eq!(cfg.command_timeout_secs, 42);
        assert_eq!(cfg.sidecar.command, vec!["kotlin-sidecar", "--stdio", "--quiet"]);
        assert!(cfg.dispatch_log.resolved_path().is_none());
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn explicit_dispatch_log_path() {
        let env: EnvSnapshot = [("MCP_DISPATCH_LOG", "/tmp/kmcp/log.jsonl")].into_iter().collect();
        let cfg = load_config(None, &env);
        assert_eq!(cfg.dispatch_log.resolved_path(), Some(PathBuf::from("/tmp/kmcp/log.jsonl")));
    }

    #[test]
    fn file_size_ceiling_applies() {
        let mut cfg = Config::default();
        cfg.scan.max_file_bytes = u64::MAX;
        assert_eq!(cfg.effective_max_file_bytes(), ABSOLUTE_MAX_FILE_BYTES);
    }
}
