//! On-disk store: spill modified models to shadow files.
//!
//! Nothing is kept resident between borrows. `get` reopens the member from
//! its shadow file when one exists, otherwise from the original source.
//! `put` writes a shadow only for modified models; an unmodified model is
//! dropped and the previous shadow (if any) stays authoritative.
//!
//! Every shadow carries a blake3 digest taken right after the write and
//! checked before the shadow is reopened.

pub mod shadow;
pub mod workspace;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use modelshelf_core::hash::hash_file;
use modelshelf_core::model::{DataModel, ModelFormat};

use crate::error::{PutError, Result, StoreError};
use crate::{MemberSource, ModelStore, StoreKind, StoreStats};

pub use shadow::{ShadowMeta, ShadowName};
pub use workspace::Workspace;

pub struct OnDiskStore {
    workspace: Workspace,
    shadows: HashMap<usize, ShadowMeta>,
    stats: StoreStats,
}

impl OnDiskStore {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            shadows: HashMap::new(),
            stats: StoreStats::default(),
        }
    }

    pub fn root(&self) -> &Path {
        self.workspace.root()
    }

    /// Shadow metadata for `index`, if the member has been spilled.
    pub fn shadow(&self, index: usize) -> Option<&ShadowMeta> {
        self.shadows.get(&index)
    }

    /// Indices that currently have a shadow file, ascending.
    pub fn shadowed(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self.shadows.keys().copied().collect();
        out.sort_unstable();
        out
    }

    fn read_shadow<F: ModelFormat>(
        &mut self,
        index: usize,
        source: &MemberSource<'_, F>,
    ) -> Result<Option<F::Model>> {
        let Some(meta) = self.shadows.get(&index) else {
            return Ok(None);
        };
        let (len, checksum) = hash_file(&meta.path)?;
        if len != meta.len || checksum != meta.checksum {
            return Err(StoreError::ChecksumMismatch {
                index,
                path: meta.path.clone(),
            });
        }
        let model = source.format.open_model(&meta.path)?;
        tracing::trace!(index, path = %meta.path.display(), "loaded member from shadow");
        Ok(Some(model))
    }

    fn write_shadow<F: ModelFormat>(
        &mut self,
        index: usize,
        model: &F::Model,
        source: &MemberSource<'_, F>,
    ) -> Result<()> {
        let filename = source.format.model_to_filename(model);
        let name = ShadowName::new(index, &filename)?;
        let path = name.resolve(self.workspace.root());

        let original = source.path(index)?;
        if same_file(&original, &path) {
            return Err(StoreError::WouldOverwriteSource(original));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Workspace(format!("mkparent: {e}")))?;
        }
        model.save(&path)?;
        let (len, checksum) = hash_file(&path)?;

        let meta = ShadowMeta {
            name,
            path: path.clone(),
            len,
            checksum,
        };
        if let Some(old) = self.shadows.insert(index, meta) {
            // A renamed model leaves its previous shadow behind.
            if old.path != path {
                remove_stale(&old.path)?;
            }
        }
        tracing::debug!(index, path = %path.display(), len, "wrote shadow file");
        Ok(())
    }
}

impl<F: ModelFormat> ModelStore<F> for OnDiskStore {
    fn kind(&self) -> StoreKind {
        StoreKind::OnDisk
    }

    fn get(&mut self, index: usize, source: &MemberSource<'_, F>) -> Result<F::Model> {
        if index >= source.len() {
            return Err(StoreError::NoSuchMember {
                index,
                len: source.len(),
            });
        }
        if let Some(model) = self.read_shadow(index, source)? {
            self.stats.shadow_loads += 1;
            return Ok(model);
        }
        let model = source.load(index)?;
        self.stats.source_loads += 1;
        Ok(model)
    }

    fn put(
        &mut self,
        index: usize,
        model: F::Model,
        modified: bool,
        source: &MemberSource<'_, F>,
    ) -> std::result::Result<(), PutError<F::Model>> {
        if index >= source.len() {
            let len = source.len();
            return Err(PutError::new(StoreError::NoSuchMember { index, len }, model));
        }
        if !modified {
            self.stats.skipped_writes += 1;
            tracing::trace!(index, "unmodified model dropped without write");
            return Ok(());
        }
        match self.write_shadow(index, &model, source) {
            Ok(()) => {
                self.stats.shadow_writes += 1;
                Ok(())
            }
            Err(e) => Err(PutError::new(e, model)),
        }
    }

    fn stats(&self) -> StoreStats {
        self.stats
    }

    fn shadow_path(&self, index: usize) -> Option<&Path> {
        self.shadows.get(&index).map(|m| m.path.as_path())
    }

    fn workspace(&self) -> Option<&Path> {
        Some(self.workspace.root())
    }
}

/// True when `a` and `b` name the same file. `b` may not exist yet, so its
/// parent directory is canonicalized instead.
pub fn same_file(a: &Path, b: &Path) -> bool {
    let Ok(a) = fs::canonicalize(a) else {
        return false;
    };
    let b = match (b.parent(), b.file_name()) {
        (Some(parent), Some(name)) => match fs::canonicalize(parent) {
            Ok(p) => p.join(name),
            Err(_) => return false,
        },
        _ => return false,
    };
    a == b
}

fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Workspace(format!("delete: {e}"))),
    }
}
