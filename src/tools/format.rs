use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;

use crate::args::{get_bool, get_str, get_str_list};
use crate::dispatch::ToolCall;
use crate::scanner::display_rel;
use crate::tools::gradle::find_gradle_cmd;
use crate::tools::process::{run_command, tail_lines, which};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// ktlint's plain reporter: `path:line:col: message`.
pub fn parse_ktlint_output(output: &str) -> Vec<Violation> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(.+?):(\d+):(\d+):? (.+)$").unwrap());
    output
        .lines()
        .filter_map(|line| {
            let c = re.captures(line.trim())?;
            Some(Violation {
                file: c[1].to_string(),
                line: c[2].parse().ok()?,
                column: c[3].parse().ok()?,
                message: c[4].trim().to_string(),
            })
        })
        .collect()
}

pub fn format_code(call: &mut ToolCall<'_>) -> Result<Value> {
    let style = get_str(call.args, &["style"]).unwrap_or("ktlint").to_string();
    let preview = get_bool(call.args, &["preview"]).unwrap_or(false);

    // Every target must stay inside the project, globs included.
    let mut targets = Vec::new();
    for raw in get_str_list(call.args, &["targets"]) {
        let abs = call.path_under_project(&raw)?;
        let rel = abs.strip_prefix(call.root()).map(display_rel).unwrap_or_default();
        targets.push(if rel.is_empty() { ".".to_string() } else { rel });
    }
    if targets.is_empty() {
        anyhow::bail!("targets must name at least one file, directory or glob");
    }

    let timeout = Duration::from_secs(call.config().command_timeout_secs);
    let root = call.root().to_path_buf();
    call.progress(30, &format!("Running {style}"))?;

    let (command, out) = match style.as_str() {
        "spotless" => {
            let gradle = find_gradle_cmd(&root)?;
            let task = if preview { "spotlessCheck" } else { "spotlessApply" };
            let out = run_command(&gradle.program, &[task, "--console=plain"], &gradle.workdir, timeout)?;
            (format!("{} {task}", gradle.program), out)
        }
        _ => {
            if !which("ktlint") {
                anyhow::bail!("ktlint not found on PATH");
            }
            let mut args: Vec<&str> = Vec::new();
            if !preview {
                args.push("--format");
            }
            args.extend(targets.iter().map(String::as_str));
            let out = run_command("ktlint", &args, &root, timeout)?;
            (format!("ktlint {}", args.join(" ")), out)
        }
    };
    call.progress(80, "Collecting formatter results")?;

    let combined = out.combined();
    let violations = if style == "ktlint" { parse_ktlint_output(&combined) } else { Vec::new() };
    Ok(json!({
        "style": style,
        "preview": preview,
        "targets": targets,
        "command": command,
        "success": out.success(),
        "exitCode": out.status,
        "violations": violations,
        "outputTail": tail_lines(&combined, 30),
    }))
}
