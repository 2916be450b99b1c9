#![forbid(unsafe_code)]
//! modelshelf-store: where a library's models live between borrows.
//!
//! Two strategies implement [`ModelStore`]:
//! - [`InMemoryStore`]: one resident model per member, handed out by move.
//! - [`OnDiskStore`]: nothing resident; modified models are spilled to
//!   per-member shadow files in a private workspace, unmodified ones are
//!   dropped and re-read from their source on the next borrow.
//!
//! Source files are only ever opened through `ModelFormat::open_model`.

pub mod disk;
pub mod error;
pub mod memory;

use std::path::{Path, PathBuf};

use modelshelf_core::association::AssociationDescriptor;
use modelshelf_core::config::LibraryConfig;
use modelshelf_core::model::ModelFormat;
use serde::{Deserialize, Serialize};

pub use disk::{same_file, OnDiskStore, ShadowMeta, ShadowName, Workspace};
pub use error::{PutError, Result, StoreError};
pub use memory::InMemoryStore;

/// Which strategy a store implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    InMemory,
    OnDisk,
}

/// Counters describing how `get`/`put` were served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Models opened from their original source file.
    pub source_loads: u64,
    /// Models opened from a shadow file.
    pub shadow_loads: u64,
    /// Models handed out from memory without any I/O.
    pub resident_hits: u64,
    pub shadow_writes: u64,
    /// Unmodified puts that wrote nothing.
    pub skipped_writes: u64,
}

/// Everything a store needs to (re)load a member from its source.
pub struct MemberSource<'a, F: ModelFormat + ?Sized> {
    pub format: &'a F,
    /// Association with group ids already resolved.
    pub asn: &'a AssociationDescriptor,
    /// Directory relative expnames resolve against.
    pub base_dir: Option<&'a Path>,
}

impl<'a, F: ModelFormat + ?Sized> MemberSource<'a, F> {
    pub fn new(format: &'a F, asn: &'a AssociationDescriptor, base_dir: Option<&'a Path>) -> Self {
        Self {
            format,
            asn,
            base_dir,
        }
    }

    pub fn len(&self) -> usize {
        self.asn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asn.is_empty()
    }

    /// Source path of the member at `index`.
    pub fn path(&self, index: usize) -> Result<PathBuf> {
        self.asn
            .member_path(index, self.base_dir)
            .ok_or(StoreError::NoSuchMember {
                index,
                len: self.asn.len(),
            })
    }

    /// Open the member's source file and stamp its association metadata.
    pub fn load(&self, index: usize) -> Result<F::Model> {
        let path = self.path(index)?;
        let member = self.asn.member(index).ok_or(StoreError::NoSuchMember {
            index,
            len: self.asn.len(),
        })?;
        let mut model = self.format.open_model(&path)?;
        self.format
            .assign_member_to_model(&mut model, member, self.asn);
        tracing::trace!(index, path = %path.display(), "loaded member from source");
        Ok(model)
    }
}

/// Storage strategy behind a model library.
///
/// `get` transfers ownership of the model at `index` to the caller; `put`
/// takes it back. The library guarantees `get` is never called twice for the
/// same index without an intervening `put`.
pub trait ModelStore<F: ModelFormat> {
    fn kind(&self) -> StoreKind;

    fn get(&mut self, index: usize, source: &MemberSource<'_, F>) -> Result<F::Model>;

    /// Return a model. `modified == false` lets a store skip persisting it.
    fn put(
        &mut self,
        index: usize,
        model: F::Model,
        modified: bool,
        source: &MemberSource<'_, F>,
    ) -> std::result::Result<(), PutError<F::Model>>;

    fn stats(&self) -> StoreStats;

    /// Current shadow file for `index`, if this store keeps any.
    fn shadow_path(&self, _index: usize) -> Option<&Path> {
        None
    }

    /// Root of the shadow workspace, if this store has one.
    fn workspace(&self) -> Option<&Path> {
        None
    }
}

/// Build the store selected by `cfg.on_disk` for `len` members.
pub fn build_store_from_config<F>(cfg: &LibraryConfig, len: usize) -> Result<Box<dyn ModelStore<F>>>
where
    F: ModelFormat + 'static,
    F::Model: 'static,
{
    if cfg.on_disk {
        let workspace = match cfg.temp_directory.as_deref() {
            Some(dir) => Workspace::provided(dir)?,
            None => Workspace::temporary()?,
        };
        Ok(Box::new(OnDiskStore::new(workspace)))
    } else {
        Ok(Box::new(InMemoryStore::<F::Model>::new(len)))
    }
}
