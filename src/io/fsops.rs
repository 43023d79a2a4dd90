//! Filesystem helpers for building image trees.
//!
//! `copy_tree` merges into an existing destination, overwriting files
//! on collision. The FROM directive relies on that: later bases win.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|err| Error::fs(path, err))
}

/// Copy a single file, preserving its permission bits.
pub fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(source, dest).map_err(|err| Error::fs(source, err))?;
    Ok(())
}

/// Recursively copy `source` into `dest`, creating directories as
/// needed and overwriting existing files.
pub fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    debug!(source = %source.display(), dest = %dest.display(), "copying tree");
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|err| Error::Io(err.into()))?;
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            fs::copy(entry.path(), &target).map_err(|err| Error::fs(entry.path(), err))?;
        }
    }
    Ok(())
}

/// Mark a rendered script executable (0755).
pub fn make_executable(path: &Path) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|err| Error::fs(path, err))
}
