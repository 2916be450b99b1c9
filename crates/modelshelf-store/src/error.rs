use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type local to modelshelf-store.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Core(#[from] modelshelf_core::error::Error),

    #[error("member index {index} out of range for {len} members")]
    NoSuchMember { index: usize, len: usize },

    #[error("shadow workspace error: {0}")]
    Workspace(String),

    #[error("shadow file for member {index} failed checksum: {}", path.display())]
    ChecksumMismatch { index: usize, path: PathBuf },

    #[error("refusing to write a shadow file over source file {}", .0.display())]
    WouldOverwriteSource(PathBuf),

    #[error("invalid shadow filename '{0}'")]
    InvalidFilename(String),
}

/// A rejected `put`: the model is handed back so the caller can retry.
pub struct PutError<M> {
    pub error: StoreError,
    pub model: M,
}

impl<M> PutError<M> {
    pub fn new(error: impl Into<StoreError>, model: M) -> Self {
        Self {
            error: error.into(),
            model,
        }
    }

    pub fn into_parts(self) -> (StoreError, M) {
        (self.error, self.model)
    }
}

impl<M> fmt::Debug for PutError<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<M> fmt::Display for PutError<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<M> std::error::Error for PutError<M> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
