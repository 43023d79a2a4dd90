//! Tool configuration, loaded from `/usr/local/etc/jailfile.toml`.
//!
//! The file is intended to be edited by humans; missing fields (or a
//! missing file) fall back to the conventional ezjail layout. The jail
//! directories and default network can also be overridden through
//! environment variables, which take precedence over the file.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "/usr/local/etc/jailfile.toml";

pub const FLAVOURS_DIR_VAR: &str = "JAILFILE_FLAVOURS_DIR";
pub const JAILS_DIR_VAR: &str = "JAILFILE_JAILS_DIR";
pub const DEFAULT_NETWORK_VAR: &str = "JAILFILE_DEFAULT_NETWORK";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Where built flavours are installed and FROM bases are read from.
    pub flavours_dir: PathBuf,

    /// Root directory holding live jail filesystems.
    pub jails_dir: PathBuf,

    /// Network spec handed opaquely to the backend when creating an
    /// instance.
    pub default_network: String,

    /// Wall-clock budget for a single backend command.
    pub command_timeout_secs: u64,

    /// Truncate captured command output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flavours_dir: PathBuf::from("/usr/jails/flavours"),
            jails_dir: PathBuf::from("/usr/jails"),
            default_network: "lo1|127.1.1.5".to_string(),
            command_timeout_secs: 10 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.default_network.trim().is_empty() {
            return Err(anyhow!("default_network must not be empty"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var(FLAVOURS_DIR_VAR) {
            self.flavours_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var(JAILS_DIR_VAR) {
            self.jails_dir = PathBuf::from(dir);
        }
        if let Ok(network) = env::var(DEFAULT_NETWORK_VAR) {
            self.default_network = network;
        }
    }

    /// Absolute path of a flavour's materialized tree.
    pub fn flavour_dir(&self, name: &str) -> PathBuf {
        self.flavours_dir.join(name)
    }

    /// Absolute path of a live instance's root filesystem.
    pub fn jail_dir(&self, instance: &str) -> PathBuf {
        self.jails_dir.join(instance)
    }
}

/// Load config from a TOML file, with env overrides applied on top.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut cfg = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?
    } else {
        Config::default()
    };
    cfg.apply_env_overrides();
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg.flavours_dir, PathBuf::from("/usr/jails/flavours"));
        assert_eq!(cfg.default_network, "lo1|127.1.1.5");
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("jailfile.toml");
        std::fs::write(&path, "jails_dir = \"/tank/jails\"\n").expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.jails_dir, PathBuf::from("/tank/jails"));
        assert_eq!(cfg.flavours_dir, Config::default().flavours_dir);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("jailfile.toml");
        std::fs::write(&path, "command_timeout_secs = 0\n").expect("write");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn flavour_and_jail_dirs_join_names() {
        let cfg = Config::default();
        assert_eq!(
            cfg.flavour_dir("web"),
            PathBuf::from("/usr/jails/flavours/web")
        );
        assert_eq!(cfg.jail_dir("web_1"), PathBuf::from("/usr/jails/web_1"));
    }
}
