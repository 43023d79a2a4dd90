//! Orchestration for `jailfile create`: create an instance from an
//! installed flavour and bootstrap it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::manifest::Manifest;
use crate::engine::{Engine, ExecutionSession};
use crate::io::backend::JailBackend;
use crate::io::config::Config;

#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub manifest_path: PathBuf,
    /// Instance name; defaults to `<flavour>_<uuid>`.
    pub instance: Option<String>,
    /// Network spec; defaults to the configured network.
    pub network: Option<String>,
}

/// Create and bootstrap an instance, returning its name.
///
/// A failed bootstrap rolls back (deactivate) before the session stops
/// the instance; rollback failures are logged and the bootstrap error
/// is reported.
pub fn run_create(
    request: &CreateRequest,
    config: &Config,
    backend: &dyn JailBackend,
) -> Result<String> {
    let manifest = Manifest::load(&request.manifest_path)
        .with_context(|| format!("load {}", request.manifest_path.display()))?;
    let engine = Engine::new(&manifest, config)?;
    let flavour = manifest.name()?.to_string();

    let instance = request
        .instance
        .clone()
        .unwrap_or_else(|| format!("{flavour}_{}", Uuid::new_v4()));
    let network = request
        .network
        .as_deref()
        .unwrap_or(&config.default_network);

    backend.create_instance(&flavour, &instance, network)?;

    let session = ExecutionSession::begin(backend, instance.clone())?;
    match engine.bootstrap(&session) {
        Ok(()) => {
            session.finish()?;
            info!(instance, flavour, "instance created");
            Ok(instance)
        }
        Err(err) => {
            if let Err(rollback) = engine.deactivate(&session) {
                warn!(%rollback, "rollback after failed bootstrap did not complete");
            }
            if let Err(stop) = session.finish() {
                warn!(%stop, "failed to stop instance after failed bootstrap");
            }
            Err(err).with_context(|| format!("bootstrap instance {instance}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{BackendCall, ScriptedBackend};
    use std::fs;

    fn setup(temp: &tempfile::TempDir, manifest: &str) -> (Config, PathBuf) {
        let config = Config {
            flavours_dir: temp.path().join("flavours"),
            jails_dir: temp.path().join("jails"),
            ..Config::default()
        };
        let manifest_path = temp.path().join("Jailfile");
        fs::write(&manifest_path, manifest).expect("write manifest");
        (config, manifest_path)
    }

    #[test]
    fn create_generates_instance_name_and_uses_default_network() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (config, manifest_path) = setup(&temp, "NAME demo\nRUN echo ready\n");
        let backend = ScriptedBackend::new();

        let instance = run_create(
            &CreateRequest {
                manifest_path,
                instance: None,
                network: None,
            },
            &config,
            &backend,
        )
        .expect("create");

        assert!(instance.starts_with("demo_"));
        let calls = backend.calls();
        let BackendCall::CreateInstance {
            flavour,
            instance: created,
            network,
        } = &calls[0]
        else {
            panic!("expected create_instance first, got {calls:?}");
        };
        assert_eq!(flavour, "demo");
        assert_eq!(created, &instance);
        assert_eq!(network, &config.default_network);

        // start, exec, stop in order after creation
        assert_eq!(calls[1], BackendCall::Start(instance.clone()));
        assert!(matches!(calls[2], BackendCall::Exec { .. }));
        assert_eq!(calls[3], BackendCall::Stop(instance.clone()));
    }

    #[test]
    fn create_honors_explicit_name_and_network() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (config, manifest_path) = setup(&temp, "NAME demo\n");
        let backend = ScriptedBackend::new();

        let instance = run_create(
            &CreateRequest {
                manifest_path,
                instance: Some("web_1".to_string()),
                network: Some("em0|10.0.0.7".to_string()),
            },
            &config,
            &backend,
        )
        .expect("create");

        assert_eq!(instance, "web_1");
        let BackendCall::CreateInstance { network, .. } = &backend.calls()[0] else {
            panic!("expected create_instance");
        };
        assert_eq!(network, "em0|10.0.0.7");
    }

    #[test]
    fn failed_bootstrap_rolls_back_and_stops() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (config, manifest_path) = setup(
            &temp,
            "NAME demo\nVOLUME /data /mnt/data\nRUN false\nRUN touch marker\n",
        );
        // mount ok, then RUN false fails
        let backend = ScriptedBackend::with_statuses(vec![0, 1]);

        let err = run_create(
            &CreateRequest {
                manifest_path,
                instance: Some("demo_1".to_string()),
                network: None,
            },
            &config,
            &backend,
        )
        .unwrap_err();
        assert!(err.to_string().contains("bootstrap"));

        let calls = backend.calls();
        // Rollback unmounted the volume, and the instance stopped once.
        assert!(
            calls
                .iter()
                .any(|call| matches!(call, BackendCall::Unmount { .. }))
        );
        let stops = calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Stop(_)))
            .count();
        assert_eq!(stops, 1);
        // The directive after the failure never executed.
        assert_eq!(backend.exec_commands(), vec!["false".to_string()]);
    }
}
