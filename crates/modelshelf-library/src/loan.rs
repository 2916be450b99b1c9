//! A borrowed model.

use std::ops::{Deref, DerefMut};

use modelshelf_core::id::{LibraryId, LoanSerial};

/// A model on loan from a [`ModelLibrary`](crate::ModelLibrary).
///
/// Derefs to the model. Hand it back with `shelve`; a loan that is dropped
/// instead stays recorded as outstanding.
#[derive(Debug)]
pub struct Loan<M> {
    pub(crate) index: usize,
    pub(crate) library: LibraryId,
    pub(crate) serial: LoanSerial,
    pub(crate) model: M,
}

impl<M> Loan<M> {
    pub(crate) fn new(index: usize, library: LibraryId, serial: LoanSerial, model: M) -> Self {
        Self {
            index,
            library,
            serial,
            model,
        }
    }

    /// Member index this model was borrowed from.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn library_id(&self) -> LibraryId {
        self.library
    }

    pub fn serial(&self) -> LoanSerial {
        self.serial
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Detach the model. The library still counts the index as borrowed;
    /// return the model with `shelve_at`.
    pub fn into_inner(self) -> M {
        self.model
    }
}

impl<M> Deref for Loan<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.model
    }
}

impl<M> DerefMut for Loan<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.model
    }
}
