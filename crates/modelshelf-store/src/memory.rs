//! In-memory store: one resident slot per member.
//!
//! Slots start empty unless models were supplied up front; an empty slot is
//! filled from the member's source on first `get`. No files are written.

use modelshelf_core::model::ModelFormat;

use crate::error::{PutError, Result, StoreError};
use crate::{MemberSource, ModelStore, StoreKind, StoreStats};

pub struct InMemoryStore<M> {
    slots: Vec<Option<M>>,
    stats: StoreStats,
}

impl<M> InMemoryStore<M> {
    /// `len` empty slots; models are opened lazily.
    pub fn new(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || None);
        Self {
            slots,
            stats: StoreStats::default(),
        }
    }

    /// Slots pre-populated with already-loaded models.
    pub fn with_models(models: Vec<M>) -> Self {
        Self {
            slots: models.into_iter().map(Some).collect(),
            stats: StoreStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots currently holding a model.
    pub fn resident(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl<F: ModelFormat> ModelStore<F> for InMemoryStore<F::Model> {
    fn kind(&self) -> StoreKind {
        StoreKind::InMemory
    }

    fn get(&mut self, index: usize, source: &MemberSource<'_, F>) -> Result<F::Model> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(StoreError::NoSuchMember { index, len })?;
        match slot.take() {
            Some(model) => {
                self.stats.resident_hits += 1;
                Ok(model)
            }
            None => {
                let model = source.load(index)?;
                self.stats.source_loads += 1;
                Ok(model)
            }
        }
    }

    fn put(
        &mut self,
        index: usize,
        model: F::Model,
        _modified: bool,
        _source: &MemberSource<'_, F>,
    ) -> std::result::Result<(), PutError<F::Model>> {
        let len = self.slots.len();
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = Some(model);
                Ok(())
            }
            None => Err(PutError::new(StoreError::NoSuchMember { index, len }, model)),
        }
    }

    fn stats(&self) -> StoreStats {
        self.stats
    }
}
