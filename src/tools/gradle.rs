use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::args::{get_bool, get_str};
use crate::dispatch::ToolCall;
use crate::scanner::display_rel;
use crate::tools::process::{run_command, tail_lines, which};

/// How to invoke Gradle for a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradleCommand {
    pub program: String,
    /// Directory holding the wrapper (or the project root for system Gradle).
    pub workdir: PathBuf,
    pub is_wrapper: bool,
}

/// Look for `gradlew`/`gradlew.bat` from `project_root` upward; fall back to a
/// `gradle` on `PATH` when the root has a settings file.
pub fn find_gradle_cmd(project_root: &Path) -> Result<GradleCommand> {
    for dir in project_root.ancestors() {
        let gradlew = dir.join("gradlew");
        if gradlew.is_file() {
            make_executable(&gradlew);
            return Ok(GradleCommand {
                program: gradlew.to_string_lossy().to_string(),
                workdir: dir.to_path_buf(),
                is_wrapper: true,
            });
        }
        let bat = dir.join("gradlew.bat");
        if bat.is_file() {
            return Ok(GradleCommand {
                program: bat.to_string_lossy().to_string(),
                workdir: dir.to_path_buf(),
                is_wrapper: true,
            });
        }
    }

    let has_settings = ["settings.gradle", "settings.gradle.kts"]
        .iter()
        .any(|s| project_root.join(s).exists());
    if has_settings && which("gradle") {
        return Ok(GradleCommand {
            program: "gradle".to_string(),
            workdir: project_root.to_path_buf(),
            is_wrapper: false,
        });
    }

    anyhow::bail!("GradleNotFound: no gradle wrapper and no system gradle on PATH")
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)) {
        tracing::debug!(path = %path.display(), error = %e, "could not chmod gradlew");
    }
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTool {
    Gradle,
    Maven,
}

pub fn detect_build_tool(root: &Path, requested: &str) -> BuildTool {
    match requested {
        "maven" => BuildTool::Maven,
        "gradle" => BuildTool::Gradle,
        _ => {
            let gradle_files = ["build.gradle", "build.gradle.kts", "settings.gradle", "settings.gradle.kts", "gradlew"];
            let has_gradle = gradle_files.iter().any(|f| root.join(f).exists());
            if !has_gradle && root.join("pom.xml").exists() {
                BuildTool::Maven
            } else {
                BuildTool::Gradle
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTest {
    pub class: String,
    pub test: String,
}

/// Failing tests from Gradle (`Class > test FAILED`) or Surefire
/// (`[ERROR]   Class.test:42 ...`) output.
pub fn parse_failed_tests(output: &str) -> Vec<FailedTest> {
    static RE: OnceLock<[Regex; 2]> = OnceLock::new();
    let [gradle, surefire] = RE.get_or_init(|| {
        [
            Regex::new(r"^(\S+) > (.+?) FAILED\s*$").unwrap(),
            Regex::new(r"^\[ERROR\]\s+([\w.$]+)\.(\w+):\d+").unwrap(),
        ]
    });

    let mut failed: Vec<FailedTest> = Vec::new();
    for line in output.lines() {
        let line = line.trim_end();
        let caps = gradle.captures(line.trim_start()).or_else(|| surefire.captures(line));
        if let Some(c) = caps {
            let t = FailedTest {
                class: c[1].to_string(),
                test: c[2].to_string(),
            };
            if !failed.contains(&t) {
                failed.push(t);
            }
        }
    }
    failed
}

/// Build outputs present under `root`, relative and sorted.
pub fn find_artifacts(root: &Path, tool: BuildTool) -> Vec<String> {
    let patterns: &[&str] = match tool {
        BuildTool::Gradle => &[
            "**/build/outputs/**/*.apk",
            "**/build/outputs/**/*.aab",
            "**/build/outputs/**/*.aar",
            "**/build/libs/*.jar",
        ],
        BuildTool::Maven => &["target/*.jar", "target/*.war", "*/target/*.jar"],
    };

    let mut found = Vec::new();
    for pattern in patterns {
        let full = root.join(pattern);
        let Ok(paths) = glob::glob(&full.to_string_lossy()) else { continue };
        for path in paths.flatten() {
            if let Ok(rel) = path.strip_prefix(root) {
                found.push(display_rel(rel));
            }
        }
    }
    found.sort();
    found.dedup();
    found
}

pub fn build_and_test(call: &mut ToolCall<'_>) -> Result<Value> {
    let requested = get_str(call.args, &["buildTool", "build_tool"]).unwrap_or("auto");
    let skip_tests = get_bool(call.args, &["skipTests", "skip_tests"]).unwrap_or(false);
    let root = call.root().to_path_buf();
    let tool = detect_build_tool(&root, requested);
    let timeout = Duration::from_secs(call.config().command_timeout_secs);

    call.progress(30, "Building and testing")?;

    let (program, args, workdir): (String, Vec<&str>, PathBuf) = match tool {
        BuildTool::Gradle => {
            let gradle = find_gradle_cmd(&root)?;
            let mut args = vec!["build", "--console=plain"];
            if skip_tests {
                args.extend(["-x", "test"]);
            }
            (gradle.program, args, gradle.workdir)
        }
        BuildTool::Maven => {
            if !which("mvn") {
                anyhow::bail!("MavenNotFound: pom.xml present but mvn is not on PATH");
            }
            let mut args = vec!["-B", "package"];
            if skip_tests {
                args.push("-DskipTests");
            }
            ("mvn".to_string(), args, root.clone())
        }
    };

    let out = run_command(&program, &args, &workdir, timeout)?;
    call.progress(80, "Processing build results")?;

    let combined = out.combined();
    Ok(json!({
        "success": out.success(),
        "buildTool": tool,
        "command": format!("{program} {}", args.join(" ")),
        "exitCode": out.status,
        "durationMs": out.elapsed.as_millis() as u64,
        "skipTests": skip_tests,
        "failedTests": parse_failed_tests(&combined),
        "artifacts": find_artifacts(&root, tool),
        "outputTail": tail_lines(&combined, 40),
    }))
}

pub fn generate_docs(call: &mut ToolCall<'_>) -> Result<Value> {
    let doc_type = get_str(call.args, &["doc_type", "docType"]).unwrap_or("html");
    let (task, out_dir) = match doc_type {
        "javadoc" => ("dokkaJavadoc", "build/dokka/javadoc"),
        _ => ("dokkaHtml", "build/dokka/html"),
    };
    let root = call.root().to_path_buf();
    let gradle = find_gradle_cmd(&root)?;
    let timeout = Duration::from_secs(call.config().command_timeout_secs);

    call.progress(30, &format!("Running Gradle task {task}"))?;
    let out = run_command(&gradle.program, &[task, "--console=plain"], &gradle.workdir, timeout)
        .with_context(|| format!("Failed to run {task}"))?;
    if !out.success() {
        anyhow::bail!("{task} failed: {}", tail_lines(&out.combined(), 30));
    }

    let output_dir = root.join(out_dir);
    Ok(json!({
        "success": true,
        "task": task,
        "format": doc_type,
        "outputDir": output_dir.is_dir().then(|| display_rel(Path::new(out_dir))),
        "durationMs": out.elapsed.as_millis() as u64,
    }))
}
