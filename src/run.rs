//! Orchestration for `jailfile run` and `jailfile unrun`.
//!
//! Both read the instance's own manifest (copied into `etc/Jailfile`
//! at build time) rather than a manifest in the working directory.

use anyhow::{Context, Result};
use tracing::info;

use crate::core::manifest::Manifest;
use crate::engine::{Engine, ExecutionSession};
use crate::io::backend::JailBackend;
use crate::io::config::Config;

/// Run the manifest's ENTRYPOINT, or `command` when given, inside a
/// started instance.
pub fn run_instance(
    instance: &str,
    command: Option<&str>,
    config: &Config,
    backend: &dyn JailBackend,
) -> Result<()> {
    let manifest = instance_manifest(instance, config)?;
    let engine = Engine::new(&manifest, config)?;

    let session = ExecutionSession::begin(backend, instance)?;
    engine.activate(&session, command)?;
    session.finish()?;
    info!(instance, "run finished");
    Ok(())
}

/// Undo bootstrap side effects (reverse order) and stop the instance.
pub fn unrun_instance(instance: &str, config: &Config, backend: &dyn JailBackend) -> Result<()> {
    let manifest = instance_manifest(instance, config)?;
    let engine = Engine::new(&manifest, config)?;

    let session = ExecutionSession::begin(backend, instance)?;
    engine.deactivate(&session)?;
    session.finish()?;
    info!(instance, "instance deactivated");
    Ok(())
}

fn instance_manifest(instance: &str, config: &Config) -> Result<Manifest> {
    let path = config.jail_dir(instance).join("etc").join("Jailfile");
    Manifest::load(&path).with_context(|| format!("load instance manifest {}", path.display()))
}
