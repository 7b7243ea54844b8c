use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::args::get_str;
use crate::dispatch::ToolCall;
use crate::tools::process::{run_command, tail_lines, CommandOutput};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    /// Two-letter porcelain code, e.g. ` M`, `A `, `??`.
    pub status: String,
    pub path: String,
}

impl FileChange {
    fn is_added(&self) -> bool {
        self.status == "??" || self.status.contains('A')
    }

    fn is_deleted(&self) -> bool {
        self.status.contains('D')
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStatus {
    pub branch: Option<String>,
    pub upstream: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub changes: Vec<FileChange>,
    pub clean: bool,
}

fn git(call: &ToolCall<'_>, args: &[&str]) -> Result<CommandOutput> {
    let timeout = Duration::from_secs(call.config().git_timeout_secs);
    run_command("git", args, call.root(), timeout)
}

fn git_ok(call: &ToolCall<'_>, args: &[&str]) -> Result<CommandOutput> {
    let out = git(call, args)?;
    if !out.success() {
        anyhow::bail!("git {} failed: {}", args.join(" "), tail_lines(out.stderr.trim(), 10));
    }
    Ok(out)
}

/// Parse `git status --porcelain=v1 --branch`.
pub fn parse_porcelain(text: &str) -> GitStatus {
    let mut status = GitStatus::default();
    for line in text.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            parse_branch_header(header, &mut status);
            continue;
        }
        if line.len() < 4 {
            continue;
        }
        let (code, rest) = line.split_at(2);
        let path = rest.trim_start();
        // Renames are reported as `old -> new`; keep the new path.
        let path = path.rsplit(" -> ").next().unwrap_or(path);
        status.changes.push(FileChange {
            status: code.to_string(),
            path: path.trim_matches('"').to_string(),
        });
    }
    status.clean = status.changes.is_empty();
    status
}

fn parse_branch_header(header: &str, status: &mut GitStatus) {
    if let Some(name) = header.strip_prefix("No commits yet on ") {
        status.branch = Some(name.trim().to_string());
        return;
    }
    if header.starts_with("HEAD (no branch)") {
        return;
    }

    let (names, counts) = match header.split_once(" [") {
        Some((n, c)) => (n, Some(c.trim_end_matches(']'))),
        None => (header, None),
    };
    match names.split_once("...") {
        Some((local, upstream)) => {
            status.branch = Some(local.to_string());
            status.upstream = Some(upstream.to_string());
        }
        None => status.branch = Some(names.trim().to_string()),
    }
    for part in counts.into_iter().flat_map(|c| c.split(", ")) {
        if let Some(n) = part.strip_prefix("ahead ") {
            status.ahead = n.parse().unwrap_or(0);
        } else if let Some(n) = part.strip_prefix("behind ") {
            status.behind = n.parse().unwrap_or(0);
        }
    }
}

fn read_status(call: &ToolCall<'_>) -> Result<GitStatus> {
    let out = git(call, &["status", "--porcelain=v1", "--branch"])?;
    if !out.success() {
        anyhow::bail!("Not a git repository (or git failed): {}", out.stderr.trim());
    }
    Ok(parse_porcelain(&out.stdout))
}

pub fn git_status(call: &mut ToolCall<'_>) -> Result<Value> {
    call.progress(30, "Checking Git status")?;
    let status = read_status(call)?;
    Ok(serde_json::to_value(status)?)
}

fn is_test_path(path: &str) -> bool {
    path.contains("/test/") || path.contains("/androidTest/") || path.starts_with("test/") || path.contains("Test.")
}

fn is_build_path(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.ends_with(".gradle")
        || name.ends_with(".gradle.kts")
        || name == "gradle.properties"
        || name == "libs.versions.toml"
        || path.starts_with("gradle/")
}

/// Conventional-commit message for a set of changes.
pub fn suggest_commit_message(changes: &[FileChange]) -> String {
    let all = |pred: fn(&FileChange) -> bool| !changes.is_empty() && changes.iter().all(pred);

    let (kind, verb) = if all(|c| c.path.ends_with(".md")) {
        ("docs", "update")
    } else if all(|c| is_test_path(&c.path)) {
        ("test", "update tests")
    } else if all(|c| is_build_path(&c.path)) {
        ("build", "update build configuration")
    } else if all(FileChange::is_deleted) {
        ("chore", "remove")
    } else if changes.iter().any(FileChange::is_added) {
        ("feat", "add")
    } else {
        ("fix", "update")
    };

    let first_dir = |c: &FileChange| c.path.split_once('/').map(|(d, _)| d.to_string());
    let scope = match changes.first().and_then(first_dir) {
        Some(dir) if changes.iter().all(|c| first_dir(c).as_deref() == Some(dir.as_str())) => format!("({dir})"),
        _ => String::new(),
    };

    let subject = match changes {
        [one] => {
            let name = one.path.rsplit('/').next().unwrap_or(&one.path);
            if kind == "build" || kind == "test" {
                format!("{verb} ({name})")
            } else {
                format!("{verb} {name}")
            }
        }
        many => format!("{verb} {} files", many.len()),
    };
    format!("{kind}{scope}: {subject}")
}

pub fn git_smart_commit(call: &mut ToolCall<'_>) -> Result<Value> {
    call.progress(30, "Creating smart commit")?;
    let status = read_status(call)?;
    if status.clean {
        return Ok(json!({ "committed": false, "message": "Nothing to commit, working tree clean" }));
    }

    let message = suggest_commit_message(&status.changes);
    git_ok(call, &["add", "-A"])?;
    call.progress(60, "Staged changes")?;
    git_ok(call, &["commit", "-m", &message])?;
    let head = git_ok(call, &["rev-parse", "--short", "HEAD"])?;

    Ok(json!({
        "committed": true,
        "message": message,
        "commit": head.stdout.trim(),
        "files": status.changes.len(),
    }))
}

/// `feature/<slug>` with only ref-safe characters.
pub fn sanitize_branch_name(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let stripped = lowered.strip_prefix("feature/").unwrap_or(&lowered);

    let mut slug = String::with_capacity(stripped.len());
    for ch in stripped.chars() {
        let ch = if ch.is_ascii_alphanumeric() || ch == '/' || ch == '_' || ch == '.' { ch } else { '-' };
        let repeated = matches!(ch, '-' | '/' | '.') && slug.ends_with(ch);
        if !repeated {
            slug.push(ch);
        }
    }
    let slug = slug.trim_matches(|c| c == '-' || c == '/' || c == '.');
    let slug = slug.trim_end_matches(".lock");
    if slug.is_empty() {
        return None;
    }
    Some(format!("feature/{slug}"))
}

pub fn git_create_feature_branch(call: &mut ToolCall<'_>) -> Result<Value> {
    let raw = get_str(call.args, &["branchName", "branch_name"]).context("branchName is required")?;
    let branch = sanitize_branch_name(raw)
        .with_context(|| format!("'{raw}' does not contain any usable branch characters"))?;
    call.progress(30, "Creating feature branch")?;

    git_ok(call, &["check-ref-format", "--branch", &branch])?;
    git_ok(call, &["checkout", "-b", &branch])?;
    Ok(json!({ "branch": branch, "created": true, "requested": raw }))
}

pub fn git_merge_with_resolution(call: &mut ToolCall<'_>) -> Result<Value> {
    let target = get_str(call.args, &["targetBranch", "target_branch"]).unwrap_or("main").to_string();
    call.progress(30, "Attempting merge with resolution")?;

    let current = git_ok(call, &["rev-parse", "--abbrev-ref", "HEAD"])?.stdout.trim().to_string();
    let merge = git(call, &["merge", "--no-ff", "--no-edit", &target])?;
    if merge.success() {
        return Ok(json!({
            "merged": true,
            "target": target,
            "into": current,
            "output": tail_lines(merge.stdout.trim(), 20),
        }));
    }

    let conflicted = git(call, &["diff", "--name-only", "--diff-filter=U"])?;
    let conflicts: Vec<String> = conflicted.stdout.lines().map(str::to_string).collect();
    if conflicts.is_empty() {
        anyhow::bail!("git merge {target} failed: {}", tail_lines(merge.combined().trim(), 10));
    }

    call.progress(70, "Conflicts detected; aborting merge")?;
    git_ok(call, &["merge", "--abort"])?;

    let advice: Vec<String> = conflicts.iter().map(|path| conflict_advice(path)).collect();
    Ok(json!({
        "merged": false,
        "target": target,
        "into": current,
        "conflicts": conflicts,
        "aborted": true,
        "advice": advice,
    }))
}

fn conflict_advice(path: &str) -> String {
    if is_build_path(path) {
        format!("{path}: keep the higher dependency versions from both sides, then run a Gradle sync")
    } else if path.ends_with(".xml") {
        format!("{path}: merge resource entries by id; duplicate ids will fail aapt")
    } else if is_test_path(path) {
        format!("{path}: keep both sets of test cases and re-run the suite")
    } else {
        format!("{path}: resolve manually, then `git add {path}` and re-run the merge")
    }
}
