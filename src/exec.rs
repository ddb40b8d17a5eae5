//! Child-process helpers: script execution and captured command output.
use anyhow::{Context, Result, bail};
use std::io::{self, Write as _};
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Result of a command execution.
#[derive(Debug)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited successfully.
    pub success: bool,
    /// Exit code, if the process was not killed by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Execute a command and return the result, bailing on non-zero exit.
fn execute_checked(mut cmd: Command, label: &str) -> Result<ExecResult> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to execute: {label}"))?;
    let result = ExecResult::from(output);
    if !result.success {
        bail!(
            "{label} failed (exit {}): {}",
            result.code.unwrap_or(-1),
            result.stderr.trim()
        );
    }
    Ok(result)
}

/// Run a command and return its output. Fails if the command exits non-zero.
pub fn run(program: &str, args: &[&str]) -> Result<ExecResult> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    execute_checked(cmd, program)
}

/// Run a command with `input` on stdin and return its raw stdout.
///
/// Fails if the command exits non-zero.
pub fn run_with_input(program: &str, args: &[&str], input: &[u8]) -> Result<Vec<u8>> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to execute: {program}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input)
            .with_context(|| format!("failed to write stdin of {program}"))?;
    }
    let output = child
        .wait_with_output()
        .with_context(|| format!("failed to wait for {program}"))?;
    if !output.status.success() {
        bail!(
            "{program} failed (exit {}): {}",
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output.stdout)
}

/// Write `body` to a temporary executable file in `dir` and run it with the
/// inherited stdio, using `work_dir` as the working directory when it exists.
///
/// The temporary file is removed when this function returns.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written or the script exits
/// non-zero.
pub fn run_script(dir: &Path, work_dir: &Path, name: &str, body: &[u8]) -> io::Result<()> {
    let file_name = Path::new(name)
        .file_name()
        .map_or_else(
            || "script".to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
    let mut file = tempfile::Builder::new()
        .prefix(&format!("{file_name}."))
        .tempfile_in(dir)?;
    file.write_all(body)?;
    file.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o700))?;
    }
    let path = file.into_temp_path();

    // A body without an interpreter line is handed to the shell.
    let mut cmd = if cfg!(unix) && !body.starts_with(b"#!") {
        let mut cmd = Command::new("sh");
        cmd.arg(&path);
        cmd
    } else {
        Command::new(&path)
    };
    if work_dir.is_dir() {
        cmd.current_dir(work_dir);
    }
    let status = cmd.status()?;
    if !status.success() {
        return Err(io::Error::other(format!(
            "{name}: script failed (exit {})",
            status.code().unwrap_or(-1)
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn run_echo() {
        let result = run("echo", &["hello"]).unwrap();
        assert!(result.success, "echo command should succeed");
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    #[cfg(unix)]
    fn run_failure() {
        let result = run("false", &[]);
        assert!(result.is_err(), "non-zero exit should produce an error");
    }

    #[test]
    #[cfg(unix)]
    fn run_with_input_pipes_stdin() {
        let out = run_with_input("cat", &[], b"piped").unwrap();
        assert_eq!(out, b"piped");
    }

    #[test]
    #[cfg(unix)]
    fn run_script_executes_body() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let body = format!("#!/bin/sh\ntouch '{}'\n", marker.display());
        run_script(dir.path(), dir.path(), "run_me.sh", body.as_bytes()).unwrap();
        assert!(marker.exists(), "script should have created the marker");
    }

    #[test]
    #[cfg(unix)]
    fn run_script_without_interpreter_line_uses_sh() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let body = format!("touch '{}'\n", marker.display());
        run_script(dir.path(), dir.path(), "plain.sh", body.as_bytes()).unwrap();
        assert!(marker.exists());
    }

    #[test]
    #[cfg(unix)]
    fn run_script_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_script(dir.path(), dir.path(), "fail.sh", b"#!/bin/sh\nexit 3\n")
            .unwrap_err();
        assert!(err.to_string().contains("exit 3"), "unexpected: {err}");
    }

    #[test]
    #[cfg(unix)]
    fn run_script_removes_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        run_script(dir.path(), dir.path(), "ok.sh", b"#!/bin/sh\ntrue\n").unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
