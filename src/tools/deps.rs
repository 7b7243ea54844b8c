use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::args::get_u64;
use crate::dispatch::ToolCall;
use crate::scanner::{display_rel, scan_project, ScanOptions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub file: String,
    pub line: usize,
    pub configuration: String,
    pub group: String,
    pub name: String,
    pub version: Option<String>,
}

impl Dependency {
    pub fn coordinate(&self) -> String {
        match &self.version {
            Some(v) => format!("{}:{}:{v}", self.group, self.name),
            None => format!("{}:{}", self.group, self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub rule: &'static str,
    pub file: String,
    pub line: usize,
    pub message: String,
}

fn patterns() -> &'static [Regex; 2] {
    static RE: OnceLock<[Regex; 2]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            // implementation("g:n:v"), api 'g:n', kapt("g:n:v@aar") ...
            Regex::new(r#"^\s*(\w+)\s*\(?\s*["']([^"':\s]+):([^"':\s]+)(?::([^"'@\s]+))?(?:@\w+)?["']"#).unwrap(),
            Regex::new(r#"(?:maven|url)\s*[({]?\s*(?:url\s*[=(]?\s*)?(?:uri\()?\s*["'](http://[^"']+)["']"#).unwrap(),
        ]
    })
}

const CONFIGURATIONS: [&str; 12] = [
    "implementation",
    "api",
    "compileOnly",
    "runtimeOnly",
    "testImplementation",
    "androidTestImplementation",
    "debugImplementation",
    "releaseImplementation",
    "kapt",
    "ksp",
    "annotationProcessor",
    "classpath",
];

/// Dependencies and findings for one Gradle build script.
pub fn audit_build_script(file: &str, text: &str) -> (Vec<Dependency>, Vec<Finding>) {
    let [dep_re, repo_re] = patterns();
    let mut deps = Vec::new();
    let mut findings = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        if line.trim_start().starts_with("//") {
            continue;
        }

        if let Some(c) = repo_re.captures(line) {
            findings.push(Finding {
                severity: Severity::High,
                rule: "insecure_repository",
                file: file.to_string(),
                line: line_no,
                message: format!("Repository uses plain HTTP: {}", &c[1]),
            });
        }

        let Some(c) = dep_re.captures(line) else { continue };
        if !CONFIGURATIONS.contains(&&c[1]) {
            continue;
        }
        let dep = Dependency {
            file: file.to_string(),
            line: line_no,
            configuration: c[1].to_string(),
            group: c[2].to_string(),
            name: c[3].to_string(),
            version: c.get(4).map(|m| m.as_str().to_string()),
        };

        let finding = |severity, rule, message: String| Finding {
            severity,
            rule,
            file: file.to_string(),
            line: line_no,
            message,
        };
        match dep.version.as_deref() {
            None => findings.push(finding(
                Severity::Low,
                "unpinned_version",
                format!("{} has no explicit version (BOM or catalog managed?)", dep.coordinate()),
            )),
            Some(v) if v.contains('+') || v.starts_with("latest.") => findings.push(finding(
                Severity::High,
                "dynamic_version",
                format!("{} uses a dynamic version", dep.coordinate()),
            )),
            Some(v) if v.to_ascii_uppercase().ends_with("-SNAPSHOT") => findings.push(finding(
                Severity::Medium,
                "snapshot_version",
                format!("{} depends on a snapshot build", dep.coordinate()),
            )),
            Some(_) => {}
        }
        deps.push(dep);
    }
    (deps, findings)
}

pub fn dependency_audit(call: &mut ToolCall<'_>) -> Result<Value> {
    let max_findings = get_u64(call.args, &["maxFindings", "max_findings"]).map(|n| n as usize);

    call.progress(30, "Auditing Gradle dependencies")?;
    let opts = ScanOptions::for_project(call.root(), call.config()).with_extensions(&["gradle", "kts"]);
    let scripts: Vec<_> = scan_project(&opts)?
        .into_iter()
        .filter(|f| {
            let name = f.rel_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            name.starts_with("build.gradle") || name.starts_with("settings.gradle")
        })
        .collect();

    let mut dependencies = Vec::new();
    let mut findings = Vec::new();
    for script in &scripts {
        let Ok(text) = std::fs::read_to_string(&script.abs_path) else { continue };
        let (d, f) = audit_build_script(&display_rel(&script.rel_path), &text);
        dependencies.extend(d);
        findings.extend(f);
    }
    findings.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.file.cmp(&b.file)).then(a.line.cmp(&b.line)));

    let mut by_severity: BTreeMap<Severity, usize> = BTreeMap::new();
    for f in &findings {
        *by_severity.entry(f.severity).or_default() += 1;
    }
    let total = findings.len();
    if let Some(max) = max_findings {
        findings.truncate(max);
    }

    Ok(json!({
        "buildFiles": scripts.iter().map(|s| display_rel(&s.rel_path)).collect::<Vec<_>>(),
        "dependencies": dependencies,
        "findings": findings,
        "summary": {
            "dependencyCount": dependencies.len(),
            "findingCount": total,
            "bySeverity": by_severity,
            "truncated": findings.len() < total,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
repositories {
    google()
    maven { url "http://repo.example.com/maven" }
}

dependencies {
    implementation("androidx.core:core-ktx:1.13.1")
    implementation 'com.squareup.retrofit2:retrofit:2.+'
    api("com.example:shared:1.0.0-SNAPSHOT")
    implementation(platform("androidx.compose:compose-bom:2024.05.00"))
    implementation("androidx.compose.ui:ui")
    // implementation("com.example:commented:+")
    kapt("com.google.dagger:hilt-compiler:2.51")
}
"#;

    #[test]
    fn declarations_are_extracted() {
        let (deps, _) = audit_build_script("app/build.gradle", SCRIPT);
        let coords: Vec<String> = deps.iter().map(|d| d.coordinate()).collect();
        assert_eq!(
            coords,
            vec![
                "androidx.core:core-ktx:1.13.1",
                "com.squareup.retrofit2:retrofit:2.+",
                "com.example:shared:1.0.0-SNAPSHOT",
                "androidx.compose.ui:ui",
                "com.google.dagger:hilt-compiler:2.51",
            ]
        );
        assert_eq!(deps[4].configuration, "kapt");
    }

    #[test]
    fn findings_by_severity() {
        let (_, findings) = audit_build_script("app/build.gradle", SCRIPT);
        let rules: Vec<(&str, Severity)> = findings.iter().map(|f| (f.rule, f.severity)).collect();
        assert_eq!(
            rules,
            vec![
                ("insecure_repository", Severity::High),
                ("dynamic_version", Severity::High),
                ("snapshot_version", Severity::Medium),
                ("unpinned_version", Severity::Low),
            ]
        );
        assert_eq!(findings[0].line, 4);
        assert!(findings[0].message.contains("http://repo.example.com/maven"));
    }

    #[test]
    fn kotlin_dsl_repository_uri() {
        let (_, findings) = audit_build_script("settings.gradle.kts", "maven { url = uri(\"http://insecure.test/repo\") }\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "insecure_repository");
    }
}
