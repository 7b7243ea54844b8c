//! Regex-and-heuristics classification of project files.
//!
//! Findings carry the rule name and line number only; matched text is never
//! echoed back to the client.

use anyhow::Result;
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::args::get_str_list;
use crate::dispatch::ToolCall;
use crate::scanner::{display_rel, scan_project, FileEntry, ScanOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Policy {
    #[serde(rename = "PII")]
    Pii,
    Secrets,
    #[serde(rename = "PHI")]
    Phi,
    Financial,
}

impl Policy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PII" => Some(Self::Pii),
            "Secrets" => Some(Self::Secrets),
            "PHI" => Some(Self::Phi),
            "Financial" => Some(Self::Financial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Public,
    Confidential,
    Restricted,
}

impl Level {
    fn for_policy(policy: Policy) -> Self {
        match policy {
            Policy::Secrets | Policy::Financial => Level::Restricted,
            Policy::Pii | Policy::Phi => Level::Confidential,
        }
    }
}

struct Rule {
    name: &'static str,
    policy: Policy,
    re: Regex,
    /// Extra check on the matched text.
    verify: Option<fn(&str) -> bool>,
}

fn rule(name: &'static str, policy: Policy, pattern: &str, verify: Option<fn(&str) -> bool>) -> Rule {
    Rule {
        name,
        policy,
        re: Regex::new(pattern).unwrap(),
        verify,
    }
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            rule("email", Policy::Pii, r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}", None),
            rule("phone", Policy::Pii, r"(?:\+\d{1,3}[\s.-]?)?\(?\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b", None),
            rule("ssn", Policy::Pii, r"\b\d{3}-\d{2}-\d{4}\b", None),
            rule("aws_access_key", Policy::Secrets, r"\bAKIA[0-9A-Z]{16}\b", None),
            rule("private_key", Policy::Secrets, r"-----BEGIN (?:RSA |EC |OPENSSH |DSA )?PRIVATE KEY-----", None),
            rule("google_api_key", Policy::Secrets, r"\bAIza[0-9A-Za-z_-]{35}\b", None),
            rule(
                "credential_assignment",
                Policy::Secrets,
                r#"(?i)\b(?:api[_-]?key|secret|password|passwd|token)\b\s*[:=]\s*["'][^"'\s]{8,}["']"#,
                None,
            ),
            rule(
                "health_terms",
                Policy::Phi,
                r"(?i)\b(?:diagnosis|patient[_ ]?id|medical[_ ]record|prescription|blood[_ ]type|icd-?10)\b",
                None,
            ),
            rule("card_number", Policy::Financial, r"\b(?:\d[ -]?){13,19}\b", Some(luhn_valid)),
            rule("iban", Policy::Financial, r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b", None),
        ]
    })
}

/// Luhn checksum over the digits of `s`.
pub fn luhn_valid(s: &str) -> bool {
    let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let dd = d * 2;
                if dd > 9 { dd - 9 } else { dd }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule: &'static str,
    pub policy: Policy,
    pub line: usize,
}

pub fn classify_text(text: &str, policies: &[Policy]) -> Vec<Finding> {
    let active: Vec<&Rule> = rules().iter().filter(|r| policies.contains(&r.policy)).collect();
    let mut findings = Vec::new();
    for (i, line) in text.lines().enumerate() {
        for rule in &active {
            let hit = rule
                .re
                .find_iter(line)
                .any(|m| rule.verify.map_or(true, |check| check(m.as_str())));
            if hit {
                findings.push(Finding {
                    rule: rule.name,
                    policy: rule.policy,
                    line: i + 1,
                });
            }
        }
    }
    findings
}

pub fn level_of(findings: &[Finding]) -> Level {
    findings
        .iter()
        .map(|f| Level::for_policy(f.policy))
        .max()
        .unwrap_or(Level::Public)
}

pub fn file_classify_sensitivity(call: &mut ToolCall<'_>) -> Result<Value> {
    let mut policies = Vec::new();
    for p in get_str_list(call.args, &["policies"]) {
        match Policy::parse(&p) {
            Some(policy) if !policies.contains(&policy) => policies.push(policy),
            Some(_) => {}
            None => anyhow::bail!("Unknown policy: {p}"),
        }
    }
    if policies.is_empty() {
        anyhow::bail!("policies must name at least one of PII, Secrets, PHI, Financial");
    }

    let mut targets = Vec::new();
    for raw in get_str_list(call.args, &["targets"]) {
        targets.push(call.path_under_project(&raw)?);
    }
    if targets.is_empty() {
        anyhow::bail!("targets must name at least one file or directory");
    }

    call.progress(30, "Classifying file sensitivity")?;

    // Overlapping targets are scanned once per file.
    let mut entries: BTreeMap<String, FileEntry> = BTreeMap::new();
    for target in targets {
        let opts = ScanOptions::for_project(call.root(), call.config()).with_target(target);
        for entry in scan_project(&opts)? {
            entries.entry(display_rel(&entry.rel_path)).or_insert(entry);
        }
    }

    // Binary or non-UTF-8 content is skipped.
    let classified: Vec<(&String, Vec<Finding>)> = entries
        .par_iter()
        .filter_map(|(rel, entry)| {
            let text = std::fs::read_to_string(&entry.abs_path).ok()?;
            Some((rel, classify_text(&text, &policies)))
        })
        .collect();

    let mut files: BTreeMap<&String, Value> = BTreeMap::new();
    let mut levels: BTreeMap<Level, usize> = BTreeMap::new();
    let mut by_rule: BTreeMap<&'static str, usize> = BTreeMap::new();
    for (rel, findings) in classified {
        let level = level_of(&findings);
        *levels.entry(level).or_default() += 1;
        for f in &findings {
            *by_rule.entry(f.rule).or_default() += 1;
        }
        files.insert(rel, json!({ "level": level, "findings": findings }));
    }

    Ok(json!({
        "policies": policies,
        "filesScanned": files.len(),
        "summary": {
            "byLevel": levels,
            "byRule": by_rule,
        },
        "files": files,
    }))
}
