//! Phase execution engine: drives a manifest's directives through the
//! materialize/bootstrap/activate/deactivate phases against a jail
//! backend.
//!
//! Each phase is a distinct traversal policy over the same directive
//! sequence. Materialize writes an on-disk image tree and never
//! touches a live instance; Bootstrap and Activate execute inside a
//! started instance within an [`ExecutionSession`]; Deactivate unwinds
//! bootstrap side effects in reverse order.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::core::directive::{Action, Directive, DirectiveKind};
use crate::core::manifest::Manifest;
use crate::error::{Error, Result};
use crate::io::backend::JailBackend;
use crate::io::config::Config;
use crate::io::fsops::{copy_file, copy_tree, ensure_dir};
use crate::io::script::{ScriptEngine, write_script};

/// Execution phase. Determines which directive kinds take effect and
/// in which order the sequence is traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Materialize,
    Bootstrap,
    Activate,
    Deactivate,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Materialize => "materialize",
            Phase::Bootstrap => "bootstrap",
            Phase::Activate => "activate",
            Phase::Deactivate => "deactivate",
        };
        f.write_str(name)
    }
}

/// Scoped lifecycle of a started backend instance.
///
/// `begin` starts the instance; every exit path stops it exactly once.
/// Prefer `finish()` so a stop failure is reported; dropping the
/// session (early return, panic) still stops the instance best-effort.
pub struct ExecutionSession<'a> {
    backend: &'a dyn JailBackend,
    instance: String,
    stopped: bool,
}

impl<'a> ExecutionSession<'a> {
    pub fn begin(backend: &'a dyn JailBackend, instance: impl Into<String>) -> Result<Self> {
        let instance = instance.into();
        backend.start(&instance)?;
        debug!(instance, "session started");
        Ok(Self {
            backend,
            instance,
            stopped: false,
        })
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn exec(&self, command: &str, env: &BTreeMap<String, String>) -> Result<i32> {
        self.backend.exec(&self.instance, command, env)
    }

    pub fn bind_mount(&self, source: &Path, dest: &Path) -> Result<i32> {
        self.backend.bind_mount(source, dest)
    }

    pub fn unmount(&self, dest: &Path) -> Result<i32> {
        self.backend.unmount(dest)
    }

    /// Stop the instance, reporting any failure to the caller.
    pub fn finish(mut self) -> Result<()> {
        self.stopped = true;
        self.backend.stop(&self.instance)
    }
}

impl Drop for ExecutionSession<'_> {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Err(err) = self.backend.stop(&self.instance) {
            warn!(instance = %self.instance, %err, "failed to stop instance during teardown");
        }
    }
}

/// The phase engine. Holds no mutable state; instance identity lives
/// entirely in the session.
pub struct Engine<'a> {
    manifest: &'a Manifest,
    config: &'a Config,
    scripts: ScriptEngine,
}

impl<'a> Engine<'a> {
    /// Check manifest invariants (exactly one NAME) and build the
    /// engine. No phase runs on an invalid manifest.
    pub fn new(manifest: &'a Manifest, config: &'a Config) -> Result<Self> {
        manifest.validate()?;
        Ok(Self {
            manifest,
            config,
            scripts: ScriptEngine::new(),
        })
    }

    /// Materialize phase: build the image tree at `dest`.
    ///
    /// Forward traversal over all directives. Filesystem failures
    /// abort immediately; there is no ignore-errors opt-out here.
    #[instrument(skip(self), fields(dest = %dest.display()))]
    pub fn materialize(&self, dest: &Path) -> Result<()> {
        let name = self.manifest.name()?;
        info!(name, "materializing flavour");

        for directive in self.manifest.directives() {
            self.materialize_directive(directive, name, dest)?;
        }

        // Keep the manifest inside the image so instances created from
        // this flavour can re-read it.
        if let Some(source) = self.manifest.source() {
            copy_file(source, &dest.join("etc").join("Jailfile"))?;
        }

        Ok(())
    }

    fn materialize_directive(&self, directive: &Directive, name: &str, dest: &Path) -> Result<()> {
        let position = directive.position();
        match directive.action() {
            Action::Name(value) => append_metadata(dest, &format!("NAME {value}")),
            Action::Author(value) => append_metadata(dest, &format!("AUTHOR {value}")),
            Action::Version(value) => append_metadata(dest, &format!("VERSION {value}")),
            Action::From(refs) => {
                for base in refs {
                    if let Some(version) = &base.version {
                        // Parsed but unresolved; see the FROM versioning note.
                        warn!(
                            base = base.name,
                            version, "flavour versions are advisory and not resolved"
                        );
                    }
                    copy_tree(&self.config.flavour_dir(&base.name), dest)?;
                }
                Ok(())
            }
            Action::Env { key, value } => {
                let script = self.scripts.render_environment(name, key, value)?;
                let path = dest
                    .join("usr/local/etc/jail_env")
                    .join(format!("{position:02}_flavour_{name}.env"));
                write_script(&path, &script)
            }
            Action::Run(command) => {
                let filename = format!("{position:02}_flavour.{name}");
                let script = self.scripts.render_setup(name, &filename, command)?;
                write_script(&dest.join("etc/rc.d").join(filename), &script)
            }
            Action::Add { source, dest: add_dest } => {
                let target = dest.join(strip_root(add_dest));
                ensure_dir(&target)?;
                if source.is_dir() {
                    copy_tree(source, &target)
                } else {
                    let file_name = source.file_name().ok_or_else(|| {
                        Error::Validation(format!(
                            "ADD source '{}' has no file name",
                            source.display()
                        ))
                    })?;
                    copy_file(source, &target.join(file_name))
                }
            }
            Action::Entrypoint(command) => {
                let script = self.scripts.render_entrypoint(name, command)?;
                write_script(
                    &dest.join("usr/local/bin").join(format!("flavour_{name}")),
                    &script,
                )
            }
            Action::Jexec { .. } | Action::Volume { .. } | Action::Nop => {
                debug!(%directive, "no materialize effect");
                Ok(())
            }
        }
    }

    /// Bootstrap phase: forward traversal, halting on the first failed
    /// directive unless it is flagged to ignore errors.
    #[instrument(skip_all, fields(instance = session.instance()))]
    pub fn bootstrap(&self, session: &ExecutionSession<'_>) -> Result<()> {
        self.traverse(Phase::Bootstrap, self.manifest.directives().iter(), session)
    }

    /// Activate phase: execute the override command, or the manifest's
    /// ENTRYPOINT directive, inside the session.
    ///
    /// An override executes with the manifest's full accumulated
    /// environment; the entrypoint sees the environment scoped to its
    /// own position.
    #[instrument(skip(self, session), fields(instance = session.instance()))]
    pub fn activate(
        &self,
        session: &ExecutionSession<'_>,
        override_command: Option<&str>,
    ) -> Result<()> {
        let directive = match override_command {
            Some(command) => {
                Directive::new(DirectiveKind::Entrypoint, command, self.manifest.len())
                    .map_err(Error::Validation)?
            }
            None => self
                .manifest
                .entrypoint()
                .cloned()
                .ok_or(Error::MissingDirective {
                    kind: DirectiveKind::Entrypoint,
                })?,
        };
        self.traverse(Phase::Activate, std::iter::once(&directive), session)
    }

    /// Deactivate phase: reverse traversal undoing bootstrap side
    /// effects, last mounted first unmounted.
    #[instrument(skip_all, fields(instance = session.instance()))]
    pub fn deactivate(&self, session: &ExecutionSession<'_>) -> Result<()> {
        self.traverse(
            Phase::Deactivate,
            self.manifest.directives().iter().rev(),
            session,
        )
    }

    fn traverse<'d>(
        &self,
        phase: Phase,
        directives: impl Iterator<Item = &'d Directive>,
        session: &ExecutionSession<'_>,
    ) -> Result<()> {
        for directive in directives {
            let Some(status) = self.apply(directive, phase, session)? else {
                continue;
            };
            if status != 0 {
                if directive.ignore_errors() {
                    warn!(%directive, status, "directive failed, continuing (ignore-errors)");
                    continue;
                }
                return Err(Error::Execution {
                    kind: directive.kind(),
                    position: directive.position(),
                    phase,
                    status,
                });
            }
            debug!(%directive, %phase, "directive applied");
        }
        Ok(())
    }

    /// Per-phase effect of a single directive. `None` means the kind
    /// does not participate in the phase.
    fn apply(
        &self,
        directive: &Directive,
        phase: Phase,
        session: &ExecutionSession<'_>,
    ) -> Result<Option<i32>> {
        match (phase, directive.action()) {
            // Environment takes effect through env_at on later
            // commands; the directive itself has nothing to execute.
            (Phase::Bootstrap | Phase::Deactivate, Action::Env { .. }) => Ok(Some(0)),
            (Phase::Bootstrap, Action::Run(command))
            | (Phase::Bootstrap, Action::Jexec { command, .. })
            | (Phase::Activate, Action::Entrypoint(command)) => {
                let env = self.manifest.env_at(Some(directive.position()));
                session.exec(command, &env).map(Some)
            }
            (Phase::Bootstrap | Phase::Activate, Action::Volume { source, dest }) => session
                .bind_mount(source, &self.mount_point(session.instance(), dest))
                .map(Some),
            (Phase::Deactivate, Action::Volume { dest, .. }) => session
                .unmount(&self.mount_point(session.instance(), dest))
                .map(Some),
            _ => Ok(None),
        }
    }

    /// Host-side path of a volume destination under the instance root.
    fn mount_point(&self, instance: &str, dest: &Path) -> PathBuf {
        self.config.jail_dir(instance).join(strip_root(dest))
    }
}

fn strip_root(path: &Path) -> &Path {
    path.strip_prefix("/").unwrap_or(path)
}

/// Append a metadata line to `etc/jailfile` in the image tree.
fn append_metadata(dest: &Path, line: &str) -> Result<()> {
    let etc = dest.join("etc");
    ensure_dir(&etc)?;
    let path = etc.join("jailfile");
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| Error::fs(&path, err))?;
    writeln!(file, "{line}").map_err(|err| Error::fs(&path, err))?;
    Ok(())
}
