//! Generic delegate: hands tools without a built-in handler to an external
//! sidecar process.
//!
//! The sidecar receives `{"tool", "arguments", "projectRoot"}` as JSON on stdin,
//! with argument synonyms folded onto their snake_case names,
//! and answers on stdout. JSON output is returned as-is (so a sidecar may emit
//! a finished content envelope); anything else becomes a text result.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::time::Duration;

use crate::args::normalize_inputs;
use crate::dispatch::{ToolCall, ToolDelegate};
use crate::tools::process::{run_command_with_input, tail_lines};

#[derive(Debug, Default, Clone, Copy)]
pub struct SidecarDelegate;

impl ToolDelegate for SidecarDelegate {
    fn execute(&self, call: &mut ToolCall<'_>) -> Option<Result<Value>> {
        let sidecar = call.config().sidecar.clone();
        let (program, rest) = sidecar.command.split_first()?;
        Some(run_sidecar(call, program, rest, Duration::from_secs(sidecar.timeout_secs)))
    }
}

fn run_sidecar(call: &mut ToolCall<'_>, program: &str, rest: &[String], timeout: Duration) -> Result<Value> {
    call.progress(30, &format!("Executing {} via sidecar", call.name))?;

    let request = json!({
        "tool": call.name,
        "arguments": normalize_inputs(call.args),
        "projectRoot": call.root(),
    });
    let input = serde_json::to_vec(&request)?;
    let args: Vec<&str> = rest.iter().map(String::as_str).collect();

    let out = run_command_with_input(program, &args, call.root(), timeout, Some(&input))
        .with_context(|| format!("Sidecar failed for {}", call.name))?;
    if !out.success() {
        anyhow::bail!(
            "sidecar exited with {}: {}",
            out.status.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
            tail_lines(&out.stderr, 20)
        );
    }

    let stdout = out.stdout.trim();
    Ok(serde_json::from_str(stdout).unwrap_or_else(|_| Value::String(stdout.to_string())))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::operations::OperationTracker;
    use crate::project::Workspace;
    use crate::registry::ToolRegistry;
    use serde_json::Map;
    use tempfile::TempDir;

    fn call_with(command: &[&str], f: impl FnOnce(&mut ToolCall<'_>)) {
        let tmp = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.sidecar.command = command.iter().map(|s| s.to_string()).collect();
        cfg.sidecar.timeout_secs = 10;
        let ws = Workspace::with_config(tmp.path().to_path_buf(), cfg);
        let registry = ToolRegistry::builtin();
        let mut tracker = OperationTracker::new();
        let id = tracker.begin("queryLlm");
        let mut args = Map::new();
        args.insert("prompt".into(), json!("hello"));
        let mut call = ToolCall::new("queryLlm", &args, &ws, &registry, id, &mut tracker);
        f(&mut call);
    }

    #[test]
    fn no_command_means_no_backend() {
        call_with(&[], |call| assert!(SidecarDelegate.execute(call).is_none()));
    }

    #[test]
    fn request_is_sent_as_json_and_json_comes_back() {
        call_with(&["cat"], |call| {
            let value = SidecarDelegate.execute(call).unwrap().unwrap();
            assert_eq!(value["tool"], "queryLlm");
            assert_eq!(value["arguments"]["prompt"], "hello");
            assert!(value["projectRoot"].is_string());
            assert_eq!(call.operation().unwrap().progress, 30);
        });
    }

    #[test]
    fn plain_text_output_becomes_a_string() {
        call_with(&["sh", "-c", "cat >/dev/null; echo done"], |call| {
            let value = SidecarDelegate.execute(call).unwrap().unwrap();
            assert_eq!(value, json!("done"));
        });
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        call_with(&["sh", "-c", "cat >/dev/null; echo nope >&2; exit 2"], |call| {
            let err = SidecarDelegate.execute(call).unwrap().unwrap_err();
            assert!(err.to_string().contains("nope"));
        });
    }
}
