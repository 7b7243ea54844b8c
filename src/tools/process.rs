//! Subprocess runner shared by every command-backed tool.
//!
//! Each call builds its own current-thread runtime; the server loop stays
//! synchronous and nothing else runs while the child is awaited.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// `None` when the child was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// stdout and stderr joined, for parsers that don't care which stream.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

pub fn run_command(program: &str, args: &[&str], cwd: &Path, timeout: Duration) -> Result<CommandOutput> {
    run_command_with_input(program, args, cwd, timeout, None)
}

/// Spawn `program`, optionally feed `input` on stdin, and wait at most
/// `timeout` for the write and the exit together. The child is killed on
/// drop, so a timeout leaves nothing behind.
pub fn run_command_with_input(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
    input: Option<&[u8]>,
) -> Result<CommandOutput> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build command runtime")?;

    rt.block_on(async {
        let started = Instant::now();
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to run `{program}`. Is it installed and on PATH?"))?;

        // Feed stdin while stdout/stderr drain, all under one deadline.
        let stdin = child.stdin.take();
        let feed = async move {
            let (Some(bytes), Some(mut stdin)) = (input, stdin) else {
                return Ok(());
            };
            match stdin.write_all(bytes).await {
                // The child exited or closed stdin without reading everything.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };
        let run = async { tokio::join!(feed, child.wait_with_output()) };

        let (fed, output) = tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| anyhow::anyhow!("`{program}` timed out after {}s", timeout.as_secs()))?;
        let output = output.with_context(|| format!("Failed to wait for `{program}`"))?;
        fed.with_context(|| format!("Failed to write stdin of `{program}`"))?;

        Ok::<_, anyhow::Error>(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            elapsed: started.elapsed(),
        })
    })
}

/// True when `program` resolves to an executable file on `PATH`.
pub fn which(program: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(program);
        candidate.is_file() || (cfg!(windows) && candidate.with_extension("exe").is_file())
    })
}

/// Last `max_lines` lines of `text`, for compact error reports.
pub fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn captures_output_and_status() {
        let tmp = TempDir::new().unwrap();
        let out = run_command("sh", &["-c", "echo out; echo err >&2; exit 3"], tmp.path(), Duration::from_secs(10)).unwrap();
        assert_eq!(out.status, Some(3));
        assert!(!out.success());
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[test]
    fn feeds_stdin() {
        let tmp = TempDir::new().unwrap();
        let out = run_command_with_input("cat", &[], tmp.path(), Duration::from_secs(10), Some(&b"{\"a\":1}"[..])).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "{\"a\":1}");
    }

    #[test]
    fn times_out() {
        let tmp = TempDir::new().unwrap();
        let err = run_command("sleep", &["5"], tmp.path(), Duration::from_millis(200)).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn large_input_to_a_child_that_never_reads_still_times_out() {
        let tmp = TempDir::new().unwrap();
        let payload = vec![b'a'; 1 << 20];
        let started = Instant::now();
        let err = run_command_with_input("sh", &["-c", "sleep 30"], tmp.path(), Duration::from_secs(1), Some(&payload))
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn large_input_is_echoed_without_deadlock() {
        let tmp = TempDir::new().unwrap();
        let payload = vec![b'a'; 1 << 20];
        let out = run_command_with_input("cat", &[], tmp.path(), Duration::from_secs(20), Some(&payload)).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.len(), 1 << 20);
    }

    #[test]
    fn child_that_ignores_stdin_and_exits_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let payload = vec![b'a'; 1 << 20];
        let out = run_command_with_input("sh", &["-c", "echo done"], tmp.path(), Duration::from_secs(10), Some(&payload))
            .unwrap();
        assert_eq!(out.stdout.trim(), "done");
    }

    #[test]
    fn missing_program_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(run_command("definitely-not-a-real-binary-xyz", &[], tmp.path(), Duration::from_secs(1)).is_err());
        assert!(!which("definitely-not-a-real-binary-xyz"));
        assert!(which("sh"));
    }

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail_lines("a\nb\nc", 2), "b\nc");
        assert_eq!(tail_lines("a", 5), "a");
    }
}
