//! Orchestration for `jailfile build`: materialize a flavour image
//! into a staging directory, then copy it to its destinations.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::core::manifest::Manifest;
use crate::engine::Engine;
use crate::io::config::Config;
use crate::io::fsops::{copy_tree, make_executable};

#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub manifest_path: PathBuf,
    /// Copy the built tree into `<dir>/<name>`.
    pub build_dir: Option<PathBuf>,
    /// Install the built tree into the configured flavours directory.
    pub install: bool,
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub name: String,
    pub built_to: Option<PathBuf>,
    pub installed_to: Option<PathBuf>,
}

pub fn run_build(request: &BuildRequest, config: &Config) -> Result<BuildOutcome> {
    let manifest = Manifest::load(&request.manifest_path)
        .with_context(|| format!("load {}", request.manifest_path.display()))?;
    let engine = Engine::new(&manifest, config)?;
    let name = manifest.name()?.to_string();

    let staging = tempfile::tempdir().context("create staging directory")?;
    engine
        .materialize(staging.path())
        .with_context(|| format!("materialize flavour {name}"))?;

    let mut built_to = None;
    if let Some(dir) = &request.build_dir {
        let dest = dir.join(&name);
        copy_tree(staging.path(), &dest)?;
        make_executable(&dest)?;
        built_to = Some(dest);
    }

    let mut installed_to = None;
    if request.install {
        let dest = config.flavour_dir(&name);
        copy_tree(staging.path(), &dest)?;
        make_executable(&dest)?;
        installed_to = Some(dest);
    }

    info!(name, installed = request.install, "flavour built");
    Ok(BuildOutcome {
        name,
        built_to,
        installed_to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn build_copies_image_to_build_dir_and_installs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = Config {
            flavours_dir: temp.path().join("flavours"),
            jails_dir: temp.path().join("jails"),
            ..Config::default()
        };

        let manifest_path = temp.path().join("Jailfile");
        fs::write(&manifest_path, "NAME demo\nENV GREETING hello\nENTRYPOINT serve\n")
            .expect("write manifest");

        let build_dir = temp.path().join("out");
        let outcome = run_build(
            &BuildRequest {
                manifest_path,
                build_dir: Some(build_dir.clone()),
                install: true,
            },
            &config,
        )
        .expect("build");

        assert_eq!(outcome.name, "demo");
        assert_eq!(outcome.built_to.as_deref(), Some(build_dir.join("demo").as_path()));
        assert_eq!(
            outcome.installed_to.as_deref(),
            Some(config.flavour_dir("demo").as_path())
        );

        for root in [build_dir.join("demo"), config.flavour_dir("demo")] {
            assert!(root.join("etc/jailfile").is_file());
            assert!(root.join("etc/Jailfile").is_file());
            assert!(root.join("usr/local/bin/flavour_demo").is_file());
            assert!(
                root.join("usr/local/etc/jail_env/01_flavour_demo.env")
                    .is_file()
            );
        }
    }

    #[test]
    fn build_without_name_fails_before_touching_destinations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = Config {
            flavours_dir: temp.path().join("flavours"),
            jails_dir: temp.path().join("jails"),
            ..Config::default()
        };
        let manifest_path = temp.path().join("Jailfile");
        fs::write(&manifest_path, "RUN echo hi\n").expect("write manifest");

        let err = run_build(
            &BuildRequest {
                manifest_path,
                build_dir: None,
                install: true,
            },
            &config,
        )
        .unwrap_err();
        assert!(err.to_string().contains("NAME"));
        assert!(!config.flavours_dir.exists());
    }
}
