//! Failure taxonomy shared by the parser, manifest queries, and the
//! phase engine.
//!
//! Every expected failure mode has its own variant so callers can map
//! outcomes to exit codes without string matching. Orchestration code
//! wraps these in `anyhow` for context; the variants stay reachable
//! through `downcast_ref`.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::directive::DirectiveKind;
use crate::engine::Phase;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed line or unknown verb. Always fatal; no partial
    /// manifest is ever returned.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A required directive is absent from the manifest.
    #[error("manifest has no {kind} directive")]
    MissingDirective { kind: DirectiveKind },

    /// A manifest-level invariant is violated (e.g. duplicate NAME).
    /// Detected before any phase runs.
    #[error("invalid manifest: {0}")]
    Validation(String),

    /// A directive's command returned a non-zero status during a phase
    /// and was not flagged to ignore errors. Halts the phase traversal.
    #[error("{kind} directive at position {position} failed during {phase} (exit status {status})")]
    Execution {
        kind: DirectiveKind,
        position: usize,
        phase: Phase,
        status: i32,
    },

    /// The jail backend could not be reached, or a command was
    /// interrupted before reporting a status. Fatal regardless of any
    /// ignore-errors flag; the session still stops the instance.
    #[error("jail backend unavailable: {0}")]
    Backend(String),

    /// A filesystem operation on the image tree failed.
    #[error("{}: {source}", path.display())]
    Fs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("render script: {0}")]
    Template(#[from] minijinja::Error),
}

impl Error {
    /// Attach a path to a raw I/O error.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Fs {
            path: path.into(),
            source,
        }
    }
}
