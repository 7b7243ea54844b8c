//! Tool argument accessors.
//!
//! Clients disagree on camelCase vs snake_case, so every accessor takes the
//! accepted spellings in priority order. Null, `""`, `[]` and `{}` count as absent.

use serde_json::{Map, Value};

/// Canonical snake_case name for each camelCase synonym.
const SYNONYMS: [(&str, &str); 5] = [
    ("projectRoot", "project_root"),
    ("filePath", "file_path"),
    ("buildTool", "build_tool"),
    ("skipTests", "skip_tests"),
    ("maxFindings", "max_findings"),
];

pub fn non_empty_str(v: &Value) -> Option<&str> {
    v.as_str().filter(|s| !s.trim().is_empty())
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// First non-blank value under any of `names`.
pub fn norm<'a>(args: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| args.get(*n).filter(|v| !is_blank(v)))
}

pub fn get_str<'a>(args: &'a Map<String, Value>, names: &[&str]) -> Option<&'a str> {
    norm(args, names).and_then(non_empty_str)
}

pub fn require_str<'a>(args: &'a Map<String, Value>, names: &[&str]) -> anyhow::Result<&'a str> {
    get_str(args, names).ok_or_else(|| anyhow::anyhow!("{} is required", names.join("/")))
}

pub fn get_u64(args: &Map<String, Value>, names: &[&str]) -> Option<u64> {
    norm(args, names).and_then(|v| v.as_u64())
}

pub fn get_bool(args: &Map<String, Value>, names: &[&str]) -> Option<bool> {
    norm(args, names).and_then(|v| v.as_bool())
}

/// A string or an array of strings, flattened to a list.
pub fn get_str_list(args: &Map<String, Value>, names: &[&str]) -> Vec<String> {
    match norm(args, names) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| non_empty_str(v).map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Move camelCase synonyms onto their snake_case names unless the snake_case
/// key is already present.
pub fn normalize_inputs(args: &Map<String, Value>) -> Map<String, Value> {
    let mut out = args.clone();
    for (camel, snake) in SYNONYMS {
        if !out.contains_key(snake) {
            if let Some(v) = out.remove(camel) {
                out.insert(snake.to_string(), v);
            }
        }
    }
    out
}
