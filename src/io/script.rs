//! Rendering of generated shell scripts for the image tree.

use std::fs;
use std::path::Path;

use minijinja::{Environment, context};

use crate::error::{Error, Result};
use crate::io::fsops::{ensure_dir, make_executable};

const ENVIRONMENT_TEMPLATE: &str = include_str!("../templates/environment.sh.j2");
const SETUP_TEMPLATE: &str = include_str!("../templates/setup.sh.j2");
const ENTRYPOINT_TEMPLATE: &str = include_str!("../templates/entrypoint.sh.j2");

/// Template engine wrapper around minijinja.
pub struct ScriptEngine {
    env: Environment<'static>,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("environment", ENVIRONMENT_TEMPLATE)
            .expect("environment template should be valid");
        env.add_template("setup", SETUP_TEMPLATE)
            .expect("setup template should be valid");
        env.add_template("entrypoint", ENTRYPOINT_TEMPLATE)
            .expect("entrypoint template should be valid");
        Self { env }
    }

    /// Script exporting one ENV pair, sourced by later scripts.
    pub fn render_environment(&self, flavour: &str, key: &str, value: &str) -> Result<String> {
        let template = self.env.get_template("environment")?;
        let rendered = template.render(context! {
            flavour => flavour,
            key => key,
            value => value,
        })?;
        Ok(rendered)
    }

    /// rc.d one-shot setup script wrapping a RUN command.
    pub fn render_setup(&self, flavour: &str, filename: &str, command: &str) -> Result<String> {
        let template = self.env.get_template("setup")?;
        let rendered = template.render(context! {
            flavour => flavour,
            filename => filename,
            command => command,
        })?;
        Ok(rendered)
    }

    /// Entrypoint wrapper script.
    pub fn render_entrypoint(&self, flavour: &str, command: &str) -> Result<String> {
        let template = self.env.get_template("entrypoint")?;
        let rendered = template.render(context! {
            flavour => flavour,
            command => command,
        })?;
        Ok(rendered)
    }
}

/// Write a rendered script and mark it executable.
pub fn write_script(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).map_err(|err| Error::fs(path, err))?;
    make_executable(path)
}
