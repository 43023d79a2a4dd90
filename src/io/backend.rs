//! The jail backend capability: create/start/stop an isolated
//! instance, execute commands inside it, and manage bind mounts.
//!
//! The [`JailBackend`] trait decouples the phase engine from the
//! concrete jail tooling. The shipped implementation wraps
//! `ezjail-admin` for lifecycle, `jexec` for command execution, and
//! nullfs for volume binds. Tests use a scripted backend that records
//! calls without touching the system.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::io::config::Config;
use crate::io::process::run_shell;

/// Abstraction over the jail tooling.
///
/// Command-shaped operations (`exec`, `bind_mount`, `unmount`) return
/// the exit status; the engine decides whether a non-zero status halts
/// the phase. Lifecycle operations either succeed or fail hard.
pub trait JailBackend {
    /// Create a stopped instance from an installed flavour. The
    /// network spec is passed through opaquely.
    fn create_instance(&self, flavour: &str, instance: &str, network: &str) -> Result<()>;

    fn start(&self, instance: &str) -> Result<()>;

    fn stop(&self, instance: &str) -> Result<()>;

    /// Run a shell command inside the instance with an explicit
    /// environment mapping.
    fn exec(&self, instance: &str, command: &str, env: &BTreeMap<String, String>) -> Result<i32>;

    /// Bind `source` (host path) onto `dest` (host-side path under the
    /// instance root).
    fn bind_mount(&self, source: &Path, dest: &Path) -> Result<i32>;

    fn unmount(&self, dest: &Path) -> Result<i32>;
}

/// Backend wrapping `ezjail-admin`, `jls`/`jexec`, and nullfs mounts.
pub struct EzjailBackend {
    timeout: Duration,
    output_limit_bytes: usize,
}

impl EzjailBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.command_timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    fn admin(&self, subcommand: &str, args: &str) -> Result<i32> {
        let command = format!("ezjail-admin {subcommand} {args}");
        let output = run_shell(
            &command,
            &BTreeMap::new(),
            self.timeout,
            self.output_limit_bytes,
        )?;
        Ok(output.status)
    }

    /// Resolve the running jail id for an instance via `jls`.
    ///
    /// `jls -j <name>` prints a header line followed by one line for
    /// the jail; the first token of that line is the JID.
    fn jid(&self, instance: &str) -> Result<String> {
        let output = run_shell(
            &format!("/usr/sbin/jls -j {instance}"),
            &BTreeMap::new(),
            self.timeout,
            self.output_limit_bytes,
        )?;
        if !output.success() {
            return Err(Error::Backend(format!(
                "jls reported no jail named '{instance}'"
            )));
        }
        let text = output.stdout_text();
        let jid = text
            .lines()
            .nth(1)
            .and_then(|line| line.split_whitespace().next())
            .ok_or_else(|| Error::Backend(format!("no jail '{instance}' present")))?;
        Ok(jid.to_string())
    }
}

/// Quote for single-quoted sh embedding.
fn sh_quote(command: &str) -> String {
    format!("'{}'", command.replace('\'', r"'\''"))
}

impl JailBackend for EzjailBackend {
    #[instrument(skip(self))]
    fn create_instance(&self, flavour: &str, instance: &str, network: &str) -> Result<()> {
        let status = self.admin(
            "create",
            &format!("-f {flavour} {instance} '{network}'"),
        )?;
        if status != 0 {
            return Err(Error::Backend(format!(
                "ezjail-admin create failed with status {status}"
            )));
        }
        info!(instance, flavour, "created jail");
        Ok(())
    }

    #[instrument(skip(self))]
    fn start(&self, instance: &str) -> Result<()> {
        let status = self.admin("start", instance)?;
        if status != 0 {
            return Err(Error::Backend(format!(
                "ezjail-admin start {instance} failed with status {status}"
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn stop(&self, instance: &str) -> Result<()> {
        let status = self.admin("stop", instance)?;
        if status != 0 {
            return Err(Error::Backend(format!(
                "ezjail-admin stop {instance} failed with status {status}"
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, env), fields(env_keys = env.len()))]
    fn exec(&self, instance: &str, command: &str, env: &BTreeMap<String, String>) -> Result<i32> {
        let jid = self.jid(instance)?;
        let wrapped = format!("jexec {jid} sh -c {}", sh_quote(command));
        debug!(jid, command, "executing in jail");
        let output = run_shell(&wrapped, env, self.timeout, self.output_limit_bytes)?;
        Ok(output.status)
    }

    #[instrument(skip(self))]
    fn bind_mount(&self, source: &Path, dest: &Path) -> Result<i32> {
        let output = run_shell(
            &format!(
                "mount -t nullfs {} {}",
                source.display(),
                dest.display()
            ),
            &BTreeMap::new(),
            self.timeout,
            self.output_limit_bytes,
        )?;
        Ok(output.status)
    }

    #[instrument(skip(self))]
    fn unmount(&self, dest: &Path) -> Result<i32> {
        let output = run_shell(
            &format!("umount {}", dest.display()),
            &BTreeMap::new(),
            self.timeout,
            self.output_limit_bytes,
        )?;
        Ok(output.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sh_quote_escapes_embedded_quotes() {
        assert_eq!(sh_quote("echo hi"), "'echo hi'");
        assert_eq!(sh_quote("echo 'hi'"), r"'echo '\''hi'\'''");
    }
}
