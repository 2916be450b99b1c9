//! Iteration over a library's models.

use std::iter::FusedIterator;

use modelshelf_core::model::ModelFormat;

use crate::error::{LibraryError, Result, ShelveError};
use crate::library::ModelLibrary;
use crate::loan::Loan;

/// Borrows each member in index order. See [`ModelLibrary::iter`].
///
/// Iteration stops after the first error.
pub struct Models<'a, F: ModelFormat> {
    library: &'a mut ModelLibrary<F>,
    next: usize,
    failed: bool,
}

impl<'a, F: ModelFormat> Models<'a, F> {
    pub(crate) fn new(library: &'a mut ModelLibrary<F>) -> Self {
        Self {
            library,
            next: 0,
            failed: false,
        }
    }

    pub fn shelve(&mut self, loan: Loan<F::Model>) -> std::result::Result<(), ShelveError<Loan<F::Model>>> {
        self.library.shelve(loan)
    }

    pub fn shelve_with(
        &mut self,
        loan: Loan<F::Model>,
        modify: bool,
    ) -> std::result::Result<(), ShelveError<Loan<F::Model>>> {
        self.library.shelve_with(loan, modify)
    }

    pub fn shelve_at(
        &mut self,
        index: usize,
        model: F::Model,
        modify: bool,
    ) -> std::result::Result<(), ShelveError<F::Model>> {
        self.library.shelve_at(index, model, modify)
    }

    /// The library being iterated.
    pub fn library(&mut self) -> &mut ModelLibrary<F> {
        &mut *self.library
    }
}

impl<F: ModelFormat> Iterator for Models<'_, F> {
    type Item = Result<Loan<F::Model>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next >= self.library.len() {
            return None;
        }
        match self.library.borrow(self.next) {
            Ok(loan) => {
                self.next += 1;
                Some(Ok(loan))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let left = self.library.len().saturating_sub(self.next);
        (0, Some(left))
    }
}

impl<F: ModelFormat> FusedIterator for Models<'_, F> {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    NotStarted,
    Running { owns_session: bool },
    Done,
}

/// Lazy `map_function` pass. See [`ModelLibrary::map_function`].
///
/// Each step borrows one model, calls `f(model, index)`, shelves the model
/// and yields `f`'s result. A pass that opened its own session closes it
/// after the last model; a failed close is yielded as a final `Err`. If the
/// pass is dropped early or fails part way its own session is ended without
/// checking loans.
pub struct MapModels<'a, F: ModelFormat, G> {
    library: &'a mut ModelLibrary<F>,
    f: G,
    modify: bool,
    next: usize,
    pass: Pass,
}

impl<'a, F: ModelFormat, G> MapModels<'a, F, G> {
    pub(crate) fn new(library: &'a mut ModelLibrary<F>, f: G, modify: bool) -> Self {
        Self {
            library,
            f,
            modify,
            next: 0,
            pass: Pass::NotStarted,
        }
    }

    fn start(&mut self) -> Result<bool> {
        let owns_session = !self.library.is_open();
        if owns_session {
            self.library.open()?;
        }
        self.pass = Pass::Running { owns_session };
        Ok(owns_session)
    }

    fn abort(&mut self, owns_session: bool, error: LibraryError) -> LibraryError {
        self.pass = Pass::Done;
        if owns_session {
            self.library.force_close();
        }
        error
    }
}

impl<F, G, T> Iterator for MapModels<'_, F, G>
where
    F: ModelFormat,
    G: FnMut(&mut F::Model, usize) -> T,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        let owns_session = match self.pass {
            Pass::Done => return None,
            Pass::Running { owns_session } => owns_session,
            Pass::NotStarted => match self.start() {
                Ok(owns_session) => owns_session,
                Err(e) => {
                    self.pass = Pass::Done;
                    return Some(Err(e));
                }
            },
        };

        if self.next >= self.library.len() {
            self.pass = Pass::Done;
            if owns_session {
                if let Err(e) = self.library.end_session() {
                    return Some(Err(e));
                }
            }
            return None;
        }

        let index = self.next;
        self.next += 1;
        let mut loan = match self.library.borrow(index) {
            Ok(loan) => loan,
            Err(e) => return Some(Err(self.abort(owns_session, e))),
        };
        let value = (self.f)(&mut *loan, index);
        if let Err(e) = self.library.shelve_with(loan, self.modify) {
            return Some(Err(self.abort(owns_session, e.into())));
        }
        Some(Ok(value))
    }
}

impl<F, G, T> FusedIterator for MapModels<'_, F, G>
where
    F: ModelFormat,
    G: FnMut(&mut F::Model, usize) -> T,
{
}

impl<F: ModelFormat, G> Drop for MapModels<'_, F, G> {
    fn drop(&mut self) {
        if let Pass::Running { owns_session: true } = self.pass {
            if self.library.is_open() {
                self.library.force_close();
            }
        }
    }
}
