// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{RawWorktreeFile, WorktreeFile};
use crate::errors::Result;

/// Load a worktree manifest and return the raw `RawWorktreeFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] to
/// also check the manifest.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawWorktreeFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let manifest: RawWorktreeFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), projects = manifest.project.len(), "worktree manifest loaded");

    Ok(manifest)
}

/// Load a worktree manifest from path and validate it.
///
/// Checks for:
/// - at least one project,
/// - empty project or dependency names,
/// - projects depending on themselves.
///
/// Cycles between projects are only reported as a warning: whether they
/// are fatal is decided per query by the caller.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<WorktreeFile> {
    let raw = load_from_path(&path)?;
    WorktreeFile::try_from(raw)
}
