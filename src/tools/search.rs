use anyhow::{Context, Result};
use glob::Pattern;
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::args::{get_bool, get_str, get_u64, require_str};
use crate::dispatch::ToolCall;
use crate::scanner::{display_rel, scan_project, FileEntry, ScanOptions};

const MAX_LINE_CHARS: usize = 300;

/// Expand one level of `{a,b}` alternatives per brace group:
/// `*.{kt,java}` becomes `*.kt` and `*.java`.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let Some(close) = pattern[open..].find('}').map(|i| open + i) else {
        return vec![pattern.to_string()];
    };
    let (head, tail) = (&pattern[..open], &pattern[close + 1..]);
    pattern[open + 1..close]
        .split(',')
        .flat_map(|alt| expand_braces(&format!("{head}{alt}{tail}")))
        .collect()
}

/// Matches file names, or relative paths when the pattern contains `/`.
pub struct IncludeFilter {
    patterns: Vec<Pattern>,
    by_path: bool,
}

impl IncludeFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = pattern.trim();
        let pattern = if pattern.is_empty() { "*" } else { pattern };
        let patterns = expand_braces(pattern)
            .iter()
            .map(|p| Pattern::new(p).with_context(|| format!("Invalid include pattern: {p}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            patterns,
            by_path: pattern.contains('/'),
        })
    }

    pub fn matches(&self, entry: &FileEntry) -> bool {
        let subject = if self.by_path {
            display_rel(&entry.rel_path)
        } else {
            entry
                .rel_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        };
        self.patterns.iter().any(|p| p.matches(&subject))
    }
}

fn clip(line: &str) -> String {
    let trimmed = line.trim_end();
    if trimmed.chars().count() <= MAX_LINE_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_LINE_CHARS).collect();
    out.push('…');
    out
}

fn project_files(call: &ToolCall<'_>, include: &IncludeFilter) -> Result<Vec<FileEntry>> {
    let opts = ScanOptions::for_project(call.root(), call.config());
    Ok(scan_project(&opts)?.into_iter().filter(|f| include.matches(f)).collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub file: String,
    pub line: usize,
    pub text: String,
    pub before: Vec<String>,
    pub after: Vec<String>,
}

/// Matches in one file's text, at most `limit`.
pub fn search_text(file: &str, text: &str, re: &Regex, context: usize, limit: usize) -> Vec<SearchHit> {
    let lines: Vec<&str> = text.lines().collect();
    let mut hits = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if hits.len() >= limit {
            break;
        }
        if !re.is_match(line) {
            continue;
        }
        let from = i.saturating_sub(context);
        let to = (i + 1 + context).min(lines.len());
        hits.push(SearchHit {
            file: file.to_string(),
            line: i + 1,
            text: clip(line),
            before: lines[from..i].iter().map(|l| clip(l)).collect(),
            after: lines[i + 1..to].iter().map(|l| clip(l)).collect(),
        });
    }
    hits
}

pub fn project_search(call: &mut ToolCall<'_>) -> Result<Value> {
    let query = require_str(call.args, &["query"])?.to_string();
    let is_regex = get_bool(call.args, &["regex"]).unwrap_or(false);
    let include = get_str(call.args, &["includePattern", "include_pattern"]).unwrap_or("*").to_string();
    let max_results = get_u64(call.args, &["maxResults", "max_results"]).unwrap_or(50).max(1) as usize;
    let context = get_u64(call.args, &["contextLines", "context_lines"]).unwrap_or(2).min(20) as usize;

    let re = if is_regex {
        Regex::new(&query).with_context(|| format!("Invalid regular expression: {query}"))?
    } else {
        Regex::new(&regex::escape(&query))?
    };
    let filter = IncludeFilter::new(&include)?;

    call.progress(30, "Searching project")?;
    let files = project_files(call, &filter)?;

    let per_file: Vec<Vec<SearchHit>> = files
        .par_iter()
        .filter_map(|f| {
            let text = std::fs::read_to_string(&f.abs_path).ok()?;
            let found = search_text(&display_rel(&f.rel_path), &text, &re, context, max_results);
            (!found.is_empty()).then_some(found)
        })
        .collect();
    let files_with_hits = per_file.len();
    let mut hits: Vec<SearchHit> = per_file.into_iter().flatten().collect();
    let total = hits.len();
    hits.truncate(max_results);

    Ok(json!({
        "query": query,
        "regex": is_regex,
        "includePattern": include,
        "filesScanned": files.len(),
        "filesWithMatches": files_with_hits,
        "totalMatches": hits.len(),
        "truncated": total > max_results,
        "matches": hits,
    }))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoItem {
    pub file: String,
    pub line: usize,
    pub kind: String,
    pub text: String,
}

pub fn extract_todos(file: &str, text: &str) -> Vec<TodoItem> {
    static RE: OnceLock<[Regex; 2]> = OnceLock::new();
    let [marker, deprecated] = RE.get_or_init(|| {
        [
            Regex::new(r"\b(TODO|FIXME|HACK|XXX)\b(?:\([^)]*\))?[:\s-]*(.*)").unwrap(),
            Regex::new(r"@Deprecated\b(?:\(\s*(?:message\s*=\s*)?\x22([^\x22]*)\x22)?").unwrap(),
        ]
    });

    let mut items = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if let Some(c) = marker.captures(line) {
            items.push(TodoItem {
                file: file.to_string(),
                line: i + 1,
                kind: c[1].to_string(),
                text: clip(c.get(2).map(|m| m.as_str()).unwrap_or("").trim()),
            });
        } else if let Some(c) = deprecated.captures(line) {
            items.push(TodoItem {
                file: file.to_string(),
                line: i + 1,
                kind: "DEPRECATED".to_string(),
                text: clip(c.get(1).map(|m| m.as_str()).unwrap_or("").trim()),
            });
        }
    }
    items
}

pub fn todo_list_from_code(call: &mut ToolCall<'_>) -> Result<Value> {
    let include = get_str(call.args, &["includePattern", "include_pattern"])
        .unwrap_or("*.{kt,java,py,js,ts}")
        .to_string();
    let max_results = get_u64(call.args, &["maxResults", "max_results"]).unwrap_or(100).max(1) as usize;
    let filter = IncludeFilter::new(&include)?;

    call.progress(30, "Extracting TODOs from code")?;
    let files = project_files(call, &filter)?;

    let mut items: Vec<TodoItem> = files
        .par_iter()
        .flat_map_iter(|f| match std::fs::read_to_string(&f.abs_path) {
            Ok(text) => extract_todos(&display_rel(&f.rel_path), &text),
            Err(_) => Vec::new(),
        })
        .collect();
    let total = items.len();

    let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
    for item in &items {
        *by_kind.entry(item.kind.clone()).or_default() += 1;
    }
    items.truncate(max_results);

    Ok(json!({
        "includePattern": include,
        "filesScanned": files.len(),
        "total": total,
        "byKind": by_kind,
        "truncated": total > max_results,
        "items": items,
    }))
}
