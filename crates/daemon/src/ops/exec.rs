// SPDX-License-Identifier: MIT

//! Exec ops (`spec.md` §4.G): runs a shell command under an inherited but
//! filtered environment, with a timeout that kills the process group.

use agentkernel_core::KernelError;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Environment variables whose suffix marks them as a secret: never passed
/// through to a spawned command's environment, redacted in audit entries
/// regardless (`spec.md` §7's "exec environment" redaction entry).
const SECRET_SUFFIXES: &[&str] = &["_TOKEN", "_SECRET", "_KEY"];
const PASSTHROUGH_VARS: &[&str] = &["PATH", "HOME", "LANG"];

#[derive(Debug, Serialize)]
pub struct ExecResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Tokenize on whitespace with shell-style single/double quote handling;
/// only the first token (the program) is used by the permission engine.
pub fn tokenize_command(command: &str) -> Result<Vec<String>, KernelError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = command.chars().peekable();
    let mut in_token = false;

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                in_token = true;
                let quote = c;
                for next in chars.by_ref() {
                    if next == quote {
                        break;
                    }
                    current.push(next);
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    if tokens.is_empty() {
        return Err(KernelError::BadRequest("empty command".into()));
    }
    Ok(tokens)
}

fn filtered_env(overrides: &[(String, String)]) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = std::env::vars()
        .filter(|(k, _)| {
            PASSTHROUGH_VARS.contains(&k.as_str())
                && !SECRET_SUFFIXES.iter().any(|suffix| k.ends_with(suffix))
        })
        .collect();
    env.extend(overrides.iter().cloned());
    env
}

pub async fn run(
    command: &str,
    cwd: Option<&Path>,
    timeout: Duration,
    env_overrides: &[(String, String)],
) -> Result<ExecResult, KernelError> {
    let tokens = tokenize_command(command)?;
    let program = &tokens[0];
    let args = &tokens[1..];

    let mut cmd = Command::new(program);
    cmd.args(args)
        .env_clear()
        .envs(filtered_env(env_overrides))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let start = std::time::Instant::now();
    let mut child = cmd.spawn().map_err(KernelError::Io)?;
    let pid = child.id();

    let result = tokio::time::timeout(timeout, child.wait_with_output()).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(output)) => Ok(ExecResult {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
            duration_ms,
        }),
        Ok(Err(e)) => Err(KernelError::Io(e)),
        Err(_elapsed) => {
            if let Some(pid) = pid {
                let _ = signal::killpg(NixPid::from_raw(pid as i32), Signal::SIGKILL);
            }
            Ok(ExecResult {
                success: false,
                stdout: String::new(),
                stderr: "timeout".into(),
                exit_code: -1,
                duration_ms,
            })
        }
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
