//! Shadow file naming and metadata.
//!
//! Layout inside the workspace:
//! `<workspace>/<member index>/<model filename>`
//!
//! The index directory keeps names stable per member and makes collisions
//! between members impossible even when two models share a filename.

use std::path::{Path, PathBuf};

use modelshelf_core::hash::Hash256;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Workspace-relative name of a shadow file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShadowName(pub String);

impl ShadowName {
    /// `filename` must be a bare file name; directory components are rejected.
    pub fn new(index: usize, filename: &str) -> Result<Self> {
        let bare = Path::new(filename)
            .file_name()
            .and_then(|f| f.to_str())
            .filter(|f| *f == filename && !f.is_empty());
        match bare {
            Some(f) => Ok(ShadowName(format!("{index}/{f}"))),
            None => Err(StoreError::InvalidFilename(filename.to_string())),
        }
    }

    pub fn resolve(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

/// What the store remembers about a written shadow file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowMeta {
    pub name: ShadowName,
    pub path: PathBuf,
    pub len: u64,
    pub checksum: Hash256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_index_scoped() {
        let name = ShadowName::new(3, "jw_cal.json").unwrap();
        assert_eq!(name.0, "3/jw_cal.json");
        assert_eq!(
            name.resolve(Path::new("/ws")),
            PathBuf::from("/ws/3/jw_cal.json")
        );
    }

    #[test]
    fn rejects_paths_and_empty_names() {
        assert!(ShadowName::new(0, "../escape.json").is_err());
        assert!(ShadowName::new(0, "sub/dir.json").is_err());
        assert!(ShadowName::new(0, "").is_err());
        assert!(ShadowName::new(0, "..").is_err());
    }
}
