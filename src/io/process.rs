//! Child process helper: shell commands with a timeout, bounded output
//! capture, and an explicit environment mapping.
//!
//! Environment is always passed to the child directly; nothing here
//! mutates the tool's own process environment.

use std::collections::BTreeMap;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::error::{Error, Result};

/// Captured outcome of a shell command.
#[derive(Debug)]
pub struct CommandOutput {
    /// Exit status code.
    pub status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes dropped from each stream once the capture limit was hit.
    pub truncated: usize,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Run `sh -c <command>` with the given environment and timeout.
///
/// A spawn failure, a timeout, or termination by signal all mean the
/// backend never reported a status, and surface as [`Error::Backend`].
/// A non-zero exit is not an error here; callers inspect `status`.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
pub fn run_shell(
    command: &str,
    env: &BTreeMap<String, String>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(command, "spawning shell command");
    let mut child = cmd
        .spawn()
        .map_err(|err| Error::Backend(format!("spawn '{command}': {err}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Backend("stdout was not piped".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Backend("stderr was not piped".to_string()))?;

    let stdout_handle = thread::spawn(move || read_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_limited(stderr, output_limit_bytes));

    let status = match child
        .wait_timeout(timeout)
        .map_err(|err| Error::Backend(format!("wait for '{command}': {err}")))?
    {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Backend(format!(
                "'{command}' timed out after {}s",
                timeout.as_secs()
            )));
        }
    };

    let (stdout, out_truncated) = join_reader(stdout_handle)?;
    let (stderr, err_truncated) = join_reader(stderr_handle)?;
    let truncated = out_truncated + err_truncated;
    if truncated > 0 {
        warn!(truncated, "command output truncated");
    }

    let code = status.code().ok_or_else(|| {
        Error::Backend(format!("'{command}' was terminated by a signal"))
    })?;

    debug!(exit_code = code, "command finished");
    Ok(CommandOutput {
        status: code,
        stdout,
        stderr,
        truncated,
    })
}

fn join_reader(
    handle: thread::JoinHandle<std::io::Result<(Vec<u8>, usize)>>,
) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result.map_err(Error::Io),
        Err(_) => Err(Error::Backend("output reader thread panicked".to_string())),
    }
}

fn read_limited<R: Read>(mut reader: R, limit: usize) -> std::io::Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn captures_status_and_output() {
        let output = run_shell(
            "echo out; echo err >&2; exit 3",
            &no_env(),
            Duration::from_secs(5),
            1000,
        )
        .expect("run");
        assert_eq!(output.status, 3);
        assert!(!output.success());
        assert_eq!(output.stdout_text().trim(), "out");
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "err");
    }

    #[test]
    fn env_mapping_reaches_the_child() {
        let mut env = BTreeMap::new();
        env.insert("GREETING".to_string(), "hello".to_string());
        let output = run_shell(
            "printf '%s' \"$GREETING\"",
            &env,
            Duration::from_secs(5),
            1000,
        )
        .expect("run");
        assert_eq!(output.stdout_text(), "hello");
    }

    #[test]
    fn timeout_is_backend_unavailable() {
        let err = run_shell("sleep 5", &no_env(), Duration::from_millis(50), 1000).unwrap_err();
        assert!(matches!(err, Error::Backend(_)), "got {err}");
    }

    #[test]
    fn output_beyond_limit_is_dropped() {
        let output = run_shell(
            "head -c 4096 /dev/zero",
            &no_env(),
            Duration::from_secs(5),
            100,
        )
        .expect("run");
        assert_eq!(output.stdout.len(), 100);
        assert!(output.truncated >= 3996);
    }
}
