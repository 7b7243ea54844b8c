//! Append-only JSONL record of tool dispatches.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::operations::OperationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchEvent {
    Start,
    End,
}

#[derive(Debug, Serialize)]
struct Entry<'a> {
    timestamp: String,
    event: DispatchEvent,
    tool: &'a str,
    operation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u128>,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchLog {
    path: Option<PathBuf>,
}

impl DispatchLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn start(&self, tool: &str, id: OperationId) {
        self.record(tool, id, DispatchEvent::Start, None, None);
    }

    /// `outcome` is `ok` or the error kind.
    pub fn end(&self, tool: &str, id: OperationId, outcome: &str, elapsed: Duration) {
        self.record(tool, id, DispatchEvent::End, Some(outcome), Some(elapsed.as_millis()));
    }

    fn record(
        &self,
        tool: &str,
        id: OperationId,
        event: DispatchEvent,
        outcome: Option<&str>,
        duration_ms: Option<u128>,
    ) {
        let Some(path) = &self.path else { return };
        let entry = Entry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
            tool,
            operation_id: id.to_string(),
            outcome,
            duration_ms,
        };
        if let Err(e) = append_line(path, &entry) {
            tracing::warn!(path = %path.display(), error = %e, "dispatch log write failed");
        }
    }
}

fn append_line(path: &Path, entry: &impl Serialize) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let line = serde_json::to_string(entry)?;
    writeln!(file, "{line}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    #[test]
    fn writes_start_and_end_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs/dispatch.jsonl");
        let log = DispatchLog::new(Some(path.clone()));
        let id = OperationId::new();

        log.start("gitStatus", id);
        log.end("gitStatus", id, "ok", Duration::from_millis(12));

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "start");
        assert_eq!(lines[0]["operation_id"], id.to_string());
        assert!(lines[0].get("outcome").is_none());
        assert_eq!(lines[1]["event"], "end");
        assert_eq!(lines[1]["outcome"], "ok");
        assert_eq!(lines[1]["duration_ms"], 12);
    }

    #[test]
    fn unwritable_path_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let log = DispatchLog::new(Some(blocker.join("nested/dispatch.jsonl")));
        log.start("gitStatus", OperationId::new());
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let log = DispatchLog::disabled();
        assert!(log.path().is_none());
        log.start("x", OperationId::new());
    }
}
