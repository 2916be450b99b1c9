use std::fmt;

use thiserror::Error;

use modelshelf_core::error::Error as CoreError;
use modelshelf_store::StoreError;

/// Result type local to modelshelf-library.
pub type Result<T> = std::result::Result<T, LibraryError>;

#[derive(Debug, Error)]
pub enum LibraryError {
    /// Borrow, shelve or close attempted outside an open session.
    #[error("ModelLibrary is not open")]
    ClosedLibrary,

    /// Sessions do not nest.
    #[error("ModelLibrary is already open")]
    AlreadyOpen,

    #[error(transparent)]
    Borrow(#[from] BorrowError),

    #[error("index {index} out of range for library of {len} models")]
    IndexOutOfRange { index: usize, len: usize },

    /// Rejected construction input.
    #[error("invalid library input: {0}")]
    InvalidInit(String),

    #[error("ModelLibrary has no models")]
    Empty,

    /// `save` target resolves to one of the library's own input files.
    #[error("refusing to overwrite input file {}", .0.display())]
    WouldOverwriteInput(std::path::PathBuf),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Borrow protocol violations. None of these are transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BorrowError {
    #[error("Attempt to double-borrow model (index {index})")]
    DoubleBorrow { index: usize },

    #[error("Attempt to shelve an unknown model")]
    UnknownModel,

    #[error("Attempt to shelve model at a non-borrowed index ({index})")]
    NotBorrowed { index: usize },

    #[error("ModelLibrary has {count} un-returned models (indices {indices:?})")]
    Unreturned { count: usize, indices: Vec<usize> },
}

/// A failed shelve. The ledger is unchanged and `returned` holds what was
/// passed in, so the caller can retry without losing the model.
pub struct ShelveError<T> {
    pub error: LibraryError,
    pub returned: T,
}

impl<T> ShelveError<T> {
    pub fn new(error: impl Into<LibraryError>, returned: T) -> Self {
        Self {
            error: error.into(),
            returned,
        }
    }

    pub fn into_inner(self) -> T {
        self.returned
    }

    pub fn into_parts(self) -> (LibraryError, T) {
        (self.error, self.returned)
    }
}

impl<T> fmt::Debug for ShelveError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShelveError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for ShelveError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T> std::error::Error for ShelveError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<T> From<ShelveError<T>> for LibraryError {
    fn from(e: ShelveError<T>) -> Self {
        e.error
    }
}
