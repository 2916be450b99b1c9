//! Scoped open/close of a library.
//!
//! A [`Session`] opens the library when created. `close()` ends it and
//! reports any model still on loan. Dropping an unclosed session (an early
//! return or a panic in the body) ends it without checking loans; the
//! outstanding entries stay in the ledger so those indices cannot be borrowed
//! again until they are shelved.
//!
//! Only `close()` returns the un-returned-model error. A drop logs a warning
//! and the next explicit close of the library reports the same loans.

use std::ops::{Deref, DerefMut};

use modelshelf_core::model::ModelFormat;

use crate::error::Result;
use crate::library::ModelLibrary;

#[must_use = "an unclosed session swallows un-returned-model errors; call `close()`"]
pub struct Session<'a, F: ModelFormat> {
    library: &'a mut ModelLibrary<F>,
    finished: bool,
}

impl<'a, F: ModelFormat> Session<'a, F> {
    pub(crate) fn begin(library: &'a mut ModelLibrary<F>) -> Result<Self> {
        library.open()?;
        Ok(Self {
            library,
            finished: false,
        })
    }

    /// End the session. The library is closed either way; loans still out
    /// are reported as `BorrowError::Unreturned`.
    pub fn close(mut self) -> Result<()> {
        self.finished = true;
        self.library.end_session()
    }
}

impl<F: ModelFormat> Deref for Session<'_, F> {
    type Target = ModelLibrary<F>;

    fn deref(&self) -> &ModelLibrary<F> {
        &*self.library
    }
}

impl<F: ModelFormat> DerefMut for Session<'_, F> {
    fn deref_mut(&mut self) -> &mut ModelLibrary<F> {
        &mut *self.library
    }
}

impl<F: ModelFormat> Drop for Session<'_, F> {
    fn drop(&mut self) {
        if !self.finished && self.library.is_open() {
            self.library.force_close();
        }
    }
}
