//! The parsed manifest: an ordered directive sequence plus queries.
//!
//! A manifest is immutable after parsing. Insertion order is file
//! order is execution order; the engine relies on `position` being
//! unique and monotonic.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::directive::{Action, Directive, DirectiveKind};
use crate::core::parser;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    source: Option<PathBuf>,
    directives: Vec<Directive>,
}

impl Manifest {
    /// Parse manifest text with no backing file.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Manifest {
            source: None,
            directives: parser::parse(text)?,
        })
    }

    /// Read and parse a manifest file, remembering its path.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| Error::fs(path, err))?;
        Ok(Manifest {
            source: Some(path.to_path_buf()),
            directives: parser::parse(&text)?,
        })
    }

    /// Path the manifest was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Directives of the given kind, optionally limited to positions
    /// strictly before `before`.
    pub fn of_kind(&self, kind: DirectiveKind, before: Option<usize>) -> Vec<&Directive> {
        self.directives
            .iter()
            .take(before.unwrap_or(self.directives.len()))
            .filter(|directive| directive.kind() == kind)
            .collect()
    }

    /// Accumulated environment from ENV directives before `position`
    /// (all of them when `None`). Later keys override earlier ones.
    pub fn env_at(&self, position: Option<usize>) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for directive in self.of_kind(DirectiveKind::Env, position) {
            if let Action::Env { key, value } = directive.action() {
                env.insert(key.clone(), value.clone());
            }
        }
        env
    }

    /// The flavour name declared by the single NAME directive.
    ///
    /// Zero NAME directives is a missing-directive error; more than one
    /// is a validation error. Never silently picks one.
    pub fn name(&self) -> Result<&str> {
        let names = self.of_kind(DirectiveKind::Name, None);
        match names.as_slice() {
            [] => Err(Error::MissingDirective {
                kind: DirectiveKind::Name,
            }),
            [single] => match single.action() {
                Action::Name(name) => Ok(name),
                _ => unreachable!("NAME directive carries a Name action"),
            },
            many => Err(Error::Validation(format!(
                "manifest declares {} NAME directives, expected exactly one",
                many.len()
            ))),
        }
    }

    /// The ENTRYPOINT directive, if one exists. With several, the last
    /// wins (later directives override earlier state, as with ENV).
    pub fn entrypoint(&self) -> Option<&Directive> {
        self.of_kind(DirectiveKind::Entrypoint, None).pop()
    }

    /// Manifest-level invariants checked before any phase runs.
    pub fn validate(&self) -> Result<()> {
        self.name()?;
        Ok(())
    }
}
