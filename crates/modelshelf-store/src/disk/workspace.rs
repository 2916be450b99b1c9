//! Private directory that holds one library's shadow files.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Result, StoreError};

/// Either a temporary directory owned by the store (removed on drop) or a
/// caller-provided directory (left in place).
#[derive(Debug)]
pub enum Workspace {
    Owned(TempDir),
    Provided(PathBuf),
}

impl Workspace {
    /// Fresh private directory under the system temp dir.
    pub fn temporary() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("modelshelf-")
            .tempdir()
            .map_err(|e| StoreError::Workspace(format!("tempdir: {e}")))?;
        tracing::debug!(path = %dir.path().display(), "created shadow workspace");
        Ok(Workspace::Owned(dir))
    }

    /// Use `dir` (created if missing). Files written here outlive the store.
    pub fn provided(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| StoreError::Workspace(format!("mkdir: {e}")))?;
        Ok(Workspace::Provided(dir.to_path_buf()))
    }

    pub fn root(&self) -> &Path {
        match self {
            Workspace::Owned(dir) => dir.path(),
            Workspace::Provided(path) => path,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Workspace::Owned(_))
    }
}
