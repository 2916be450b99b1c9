use std::path::PathBuf;

use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or incomplete association manifest.
    #[error("invalid association: {0}")]
    AssociationFormat(String),

    /// Raised by group-id derivation hooks when no id can be computed; the
    /// caller substitutes a default `exposureNNNN` id.
    #[error("no group id: {0}")]
    NoGroupId(String),

    /// Failure reported by a data-model collaborator (open/save/finalize).
    #[error("model error: {0}")]
    Model(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid init: {0}")]
    InvalidInit(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_no_group_id(&self) -> bool {
        matches!(self, Error::NoGroupId(_))
    }
}
