use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::OnceLock;

use crate::args::{get_bool, get_str};
use crate::dispatch::ToolCall;
use crate::registry::ToolRegistry;

pub const TOOLS_START: &str = "<!-- kotlin-mcp:tools:start -->";
pub const TOOLS_END: &str = "<!-- kotlin-mcp:tools:end -->";

/// Markdown table of every registered tool, wrapped in the managed markers.
pub fn tool_catalog_section(registry: &ToolRegistry) -> String {
    let mut out = String::new();
    out.push_str(TOOLS_START);
    out.push_str("\n## Available tools\n\n| Tool | Description |\n| --- | --- |\n");
    for tool in registry.tools() {
        let desc = tool.description.replace('|', "\\|");
        let _ = writeln!(out, "| `{}` | {} |", tool.name, desc.trim());
    }
    out.push_str(TOOLS_END);
    out
}

fn fresh_readme(project: &str, has_gradlew: bool, catalog: &str) -> String {
    let build = if has_gradlew { "./gradlew" } else { "gradle" };
    format!(
        "# {project}\n\n\
         ![Kotlin](https://img.shields.io/badge/kotlin-android-7F52FF)\n\n\
         ## Setup\n\n\
         ```bash\n{build} assembleDebug\n{build} test\n```\n\n\
         {catalog}\n"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadmeAction {
    Created,
    Regenerated,
    Updated,
    Appended,
}

/// New README text plus what was done to produce it.
pub fn update_readme(existing: Option<&str>, force: bool, project: &str, has_gradlew: bool, catalog: &str) -> (String, ReadmeAction) {
    let Some(existing) = existing else {
        return (fresh_readme(project, has_gradlew, catalog), ReadmeAction::Created);
    };
    if force {
        return (fresh_readme(project, has_gradlew, catalog), ReadmeAction::Regenerated);
    }
    if let Some(start) = existing.find(TOOLS_START) {
        if let Some(end) = existing[start..].find(TOOLS_END).map(|i| start + i + TOOLS_END.len()) {
            let mut text = String::with_capacity(existing.len() + catalog.len());
            text.push_str(&existing[..start]);
            text.push_str(catalog);
            text.push_str(&existing[end..]);
            return (text, ReadmeAction::Updated);
        }
    }
    let mut text = existing.trim_end().to_string();
    text.push_str("\n\n");
    text.push_str(catalog);
    text.push('\n');
    (text, ReadmeAction::Appended)
}

pub fn readme_generate_or_update(call: &mut ToolCall<'_>) -> Result<Value> {
    let force = get_bool(call.args, &["forceRegenerate", "force_regenerate"]).unwrap_or(false);
    let root = call.root().to_path_buf();
    let path = root.join("README.md");

    call.progress(30, "Generating README")?;
    let existing = match std::fs::read_to_string(&path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };

    let catalog = tool_catalog_section(call.registry);
    let (text, action) = update_readme(
        existing.as_deref(),
        force,
        &call.workspace.name(),
        root.join("gradlew").is_file(),
        &catalog,
    );
    std::fs::write(&path, &text).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(json!({
        "path": "README.md",
        "action": action,
        "toolCount": call.registry.len(),
        "bytes": text.len(),
    }))
}

/// Release-note groups in display order, keyed by conventional commit type.
const GROUPS: [(&str, &str); 8] = [
    ("feat", "Features"),
    ("fix", "Bug Fixes"),
    ("docs", "Documentation"),
    ("perf", "Performance"),
    ("refactor", "Refactoring"),
    ("test", "Tests"),
    ("chore", "Maintenance"),
    ("", "Other"),
];

fn group_for(kind: &str) -> &'static str {
    match kind {
        "build" | "ci" | "style" | "chore" => "Maintenance",
        "tests" => "Tests",
        _ => GROUPS
            .iter()
            .find(|(k, _)| !k.is_empty() && *k == kind)
            .map(|(_, g)| *g)
            .unwrap_or("Other"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogSection {
    pub version: String,
    pub date: Option<String>,
    pub entries: Vec<String>,
}

/// `## [1.2.0] - 2024-05-01` style headings with their bullet entries.
pub fn parse_changelog(text: &str) -> Vec<ChangelogSection> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let heading = RE.get_or_init(|| Regex::new(r"^##\s+\[?([^\]\s]+)\]?(?:\s*[-–]\s*(\S+))?").unwrap());

    let mut sections: Vec<ChangelogSection> = Vec::new();
    for line in text.lines() {
        if let Some(c) = heading.captures(line) {
            sections.push(ChangelogSection {
                version: c[1].to_string(),
                date: c.get(2).map(|m| m.as_str().to_string()),
                entries: Vec::new(),
            });
            continue;
        }
        let Some(current) = sections.last_mut() else { continue };
        let trimmed = line.trim_start();
        if let Some(entry) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            let entry = entry.trim();
            if !entry.is_empty() {
                current.entries.push(entry.to_string());
            }
        }
    }
    sections
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseNote {
    pub scope: Option<String>,
    pub description: String,
    pub breaking: bool,
}

/// Split `type(scope)!: description`; non-conventional entries land in "Other".
pub fn parse_entry(entry: &str) -> (String, ReleaseNote) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(\w+)(?:\(([^)]+)\))?(!)?:\s*(.+)$").unwrap());
    match re.captures(entry) {
        Some(c) => {
            let description = c[4].trim().to_string();
            let breaking = c.get(3).is_some() || description.contains("BREAKING CHANGE");
            (
                c[1].to_ascii_lowercase(),
                ReleaseNote {
                    scope: c.get(2).map(|m| m.as_str().to_string()),
                    description,
                    breaking,
                },
            )
        }
        None => (
            String::new(),
            ReleaseNote {
                scope: None,
                description: entry.to_string(),
                breaking: entry.contains("BREAKING CHANGE"),
            },
        ),
    }
}

pub fn summarize_section(section: &ChangelogSection) -> Value {
    let mut groups: Vec<(&'static str, Vec<ReleaseNote>)> = GROUPS.iter().map(|(_, g)| (*g, Vec::new())).collect();
    let mut breaking = Vec::new();
    for entry in &section.entries {
        let (kind, note) = parse_entry(entry);
        if note.breaking {
            breaking.push(note.description.clone());
        }
        let group = group_for(&kind);
        if let Some((_, notes)) = groups.iter_mut().find(|(g, _)| *g == group) {
            notes.push(note);
        }
    }

    let groups: Vec<Value> = groups
        .into_iter()
        .filter(|(_, notes)| !notes.is_empty())
        .map(|(title, notes)| json!({ "title": title, "count": notes.len(), "entries": notes }))
        .collect();

    json!({
        "version": section.version,
        "date": section.date,
        "totalEntries": section.entries.len(),
        "groups": groups,
        "breaking": breaking,
    })
}

pub fn changelog_summarize(call: &mut ToolCall<'_>) -> Result<Value> {
    let rel = get_str(call.args, &["changelogPath", "changelog_path"]).unwrap_or("CHANGELOG.md");
    let version = get_str(call.args, &["version"]).unwrap_or("latest");
    let path = call.path_under_project(rel)?;

    call.progress(30, "Summarizing changelog")?;
    let text = std::fs::read_to_string(&path).with_context(|| format!("Failed to read changelog {}", path.display()))?;
    let sections = parse_changelog(&text);

    let section = if version == "latest" {
        sections.iter().find(|s| !s.version.eq_ignore_ascii_case("unreleased"))
    } else {
        let wanted = version.trim_start_matches('v');
        sections.iter().find(|s| s.version.trim_start_matches('v') == wanted)
    };
    let Some(section) = section else {
        let known: Vec<&str> = sections.iter().map(|s| s.version.as_str()).collect();
        anyhow::bail!("Version {version} not found in {rel} (available: {})", known.join(", "));
    };

    let mut summary = summarize_section(section);
    summary["changelogPath"] = json!(rel);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANGELOG: &str = "\
# Changelog

## [Unreleased]
- feat: not yet

## [1.4.0] - 2024-05-01
- feat(auth): biometric login
- fix: crash on rotation
- refactor(data)!: drop legacy cache
- ci: cache gradle
- Bumped copyright year

## [1.3.0] - 2024-03-10
- fix: typo
";

    #[test]
    fn changelog_sections_are_parsed() {
        let sections = parse_changelog(CHANGELOG);
        let versions: Vec<&str> = sections.iter().map(|s| s.version.as_str()).collect();
        assert_eq!(versions, vec!["Unreleased", "1.4.0", "1.3.0"]);
        assert_eq!(sections[1].date.as_deref(), Some("2024-05-01"));
        assert_eq!(sections[1].entries.len(), 5);
    }

    #[test]
    fn entries_are_grouped_in_order() {
        let sections = parse_changelog(CHANGELOG);
        let summary = summarize_section(&sections[1]);
        let titles: Vec<&str> = summary["groups"]
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Features", "Bug Fixes", "Refactoring", "Maintenance", "Other"]);
        assert_eq!(summary["breaking"], json!(["drop legacy cache"]));
        assert_eq!(summary["groups"][0]["entries"][0]["scope"], "auth");
    }

    #[test]
    fn readme_markers_are_replaced_in_place() {
        let catalog = format!("{TOOLS_START}\nNEW\n{TOOLS_END}");
        let existing = format!("# App\n\nIntro\n\n{TOOLS_START}\nOLD\n{TOOLS_END}\n\n## License\n");
        let (text, action) = update_readme(Some(&existing), false, "App", true, &catalog);
        assert_eq!(action, ReadmeAction::Updated);
        assert!(text.contains("NEW"));
        assert!(!text.contains("OLD"));
        assert!(text.starts_with("# App\n\nIntro"));
        assert!(text.ends_with("## License\n"));
    }

    #[test]
    fn readme_without_markers_gets_appended_or_regenerated() {
        let catalog = format!("{TOOLS_START}\nT\n{TOOLS_END}");
        let (text, action) = update_readme(Some("# Mine\n"), false, "App", false, &catalog);
        assert_eq!(action, ReadmeAction::Appended);
        assert!(text.starts_with("# Mine\n\n"));

        let (text, action) = update_readme(Some("# Mine\n"), true, "App", true, &catalog);
        assert_eq!(action, ReadmeAction::Regenerated);
        assert!(text.starts_with("# App"));
        assert!(text.contains("./gradlew assembleDebug"));

        let (_, action) = update_readme(None, false, "App", false, &catalog);
        assert_eq!(action, ReadmeAction::Created);
    }

    #[test]
    fn catalog_lists_every_tool() {
        let registry = ToolRegistry::builtin();
        let section = tool_catalog_section(&registry);
        assert!(section.starts_with(TOOLS_START));
        assert!(section.ends_with(TOOLS_END));
        assert_eq!(section.matches("| `").count(), registry.len());
    }
}
