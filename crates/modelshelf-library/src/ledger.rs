//! Borrow ledger: open flag plus one slot state per member.
//!
//! The ledger is the single source of truth for which members are on loan.
//! Every check runs before any mutation, so a rejected operation leaves it
//! exactly as it was.

use modelshelf_core::id::LoanSerial;

use crate::error::{BorrowError, LibraryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Borrowed {
        serial: LoanSerial,
        /// Intent recorded at borrow time; used when shelving without an
        /// explicit flag.
        modify: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Ledger {
    slots: Vec<SlotState>,
    outstanding: usize,
    open: bool,
    next_serial: LoanSerial,
}

impl Ledger {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![SlotState::Free; len],
            outstanding: 0,
            open: false,
            next_serial: LoanSerial::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn state(&self, index: usize) -> Option<SlotState> {
        self.slots.get(index).copied()
    }

    /// Indices currently on loan, ascending.
    pub fn borrowed_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, SlotState::Borrowed { .. }))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn check_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(LibraryError::ClosedLibrary)
        }
    }

    /// Would `check_out(index, _)` succeed right now?
    pub fn check_available(&self, index: usize) -> Result<()> {
        self.check_open()?;
        match self.slots.get(index) {
            None => Err(LibraryError::IndexOutOfRange {
                index,
                len: self.slots.len(),
            }),
            Some(SlotState::Borrowed { .. }) => Err(BorrowError::DoubleBorrow { index }.into()),
            Some(SlotState::Free) => Ok(()),
        }
    }

    /// Record a loan of `index` and return its serial.
    pub fn check_out(&mut self, index: usize, modify: bool) -> Result<LoanSerial> {
        self.check_available(index)?;
        let serial = self.next_serial;
        self.next_serial = serial.next();
        self.slots[index] = SlotState::Borrowed { serial, modify };
        self.outstanding += 1;
        Ok(serial)
    }

    /// Recorded intent for the loan at `index` held under `serial`.
    ///
    /// Anything that is not the current loan of that slot is unknown.
    pub fn loan_intent(&self, index: usize, serial: LoanSerial) -> Result<bool> {
        self.check_open()?;
        match self.slots.get(index) {
            Some(SlotState::Borrowed { serial: s, modify }) if *s == serial => Ok(*modify),
            _ => Err(BorrowError::UnknownModel.into()),
        }
    }

    /// Recorded intent for whatever loan is out at `index`.
    pub fn index_intent(&self, index: usize) -> Result<bool> {
        self.check_open()?;
        match self.slots.get(index) {
            Some(SlotState::Borrowed { modify, .. }) => Ok(*modify),
            _ => Err(BorrowError::NotBorrowed { index }.into()),
        }
    }

    /// Mark `index` free. Callers validate first.
    pub fn release(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            if matches!(slot, SlotState::Borrowed { .. }) {
                *slot = SlotState::Free;
                self.outstanding -= 1;
            }
        }
    }

    pub fn open(&mut self) -> Result<()> {
        if self.open {
            return Err(LibraryError::AlreadyOpen);
        }
        self.open = true;
        Ok(())
    }

    fn unreturned(&self) -> BorrowError {
        BorrowError::Unreturned {
            count: self.outstanding,
            indices: self.borrowed_indices(),
        }
    }

    /// Close if nothing is on loan; otherwise report and stay open.
    pub fn close(&mut self) -> Result<()> {
        self.check_open()?;
        if self.outstanding > 0 {
            return Err(self.unreturned().into());
        }
        self.open = false;
        Ok(())
    }

    /// End the session unconditionally, reporting anything still on loan.
    pub fn end_session(&mut self) -> Result<()> {
        self.check_open()?;
        self.open = false;
        if self.outstanding > 0 {
            return Err(self.unreturned().into());
        }
        Ok(())
    }

    /// Close without checking loans. Outstanding entries are kept and the
    /// count is returned.
    pub fn abandon(&mut self) -> usize {
        self.open = false;
        self.outstanding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened(len: usize) -> Ledger {
        let mut ledger = Ledger::new(len);
        ledger.open().unwrap();
        ledger
    }

    #[test]
    fn borrow_requires_open() {
        let mut ledger = Ledger::new(2);
        assert!(matches!(
            ledger.check_out(0, true),
            Err(LibraryError::ClosedLibrary)
        ));
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn double_borrow_is_rejected_without_change() {
        let mut ledger = opened(2);
        let serial = ledger.check_out(1, false).unwrap();
        let err = ledger.check_out(1, true).unwrap_err();
        assert!(matches!(
            err,
            LibraryError::Borrow(BorrowError::DoubleBorrow { index: 1 })
        ));
        assert_eq!(
            ledger.state(1),
            Some(SlotState::Borrowed {
                serial,
                modify: false
            })
        );
        assert_eq!(ledger.outstanding(), 1);
    }

    #[test]
    fn out_of_range_index() {
        let mut ledger = opened(1);
        assert!(matches!(
            ledger.check_out(3, true),
            Err(LibraryError::IndexOutOfRange { index: 3, len: 1 })
        ));
    }

    #[test]
    fn serials_identify_the_current_loan_only() {
        let mut ledger = opened(1);
        let first = ledger.check_out(0, true).unwrap();
        ledger.release(0);
        let second = ledger.check_out(0, false).unwrap();
        assert_ne!(first, second);
        assert!(matches!(
            ledger.loan_intent(0, first),
            Err(LibraryError::Borrow(BorrowError::UnknownModel))
        ));
        assert!(!ledger.loan_intent(0, second).unwrap());
    }

    #[test]
    fn index_intent_needs_a_loan() {
        let ledger = opened(2);
        assert!(matches!(
            ledger.index_intent(0),
            Err(LibraryError::Borrow(BorrowError::NotBorrowed { index: 0 }))
        ));
    }

    #[test]
    fn close_with_loans_stays_open() {
        let mut ledger = opened(3);
        ledger.check_out(0, true).unwrap();
        ledger.check_out(2, true).unwrap();
        match ledger.close() {
            Err(LibraryError::Borrow(BorrowError::Unreturned { count, indices })) => {
                assert_eq!(count, 2);
                assert_eq!(indices, vec![0, 2]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(ledger.is_open());
    }

    #[test]
    fn end_session_closes_and_reports() {
        let mut ledger = opened(1);
        ledger.check_out(0, true).unwrap();
        assert!(ledger.end_session().is_err());
        assert!(!ledger.is_open());
        assert_eq!(ledger.outstanding(), 1);
    }

    #[test]
    fn abandon_keeps_entries_and_blocks_reborrow() {
        let mut ledger = opened(1);
        ledger.check_out(0, true).unwrap();
        assert_eq!(ledger.abandon(), 1);
        ledger.open().unwrap();
        assert!(matches!(
            ledger.check_out(0, true),
            Err(LibraryError::Borrow(BorrowError::DoubleBorrow { index: 0 }))
        ));
    }

    #[test]
    fn sessions_do_not_nest() {
        let mut ledger = opened(0);
        assert!(matches!(ledger.open(), Err(LibraryError::AlreadyOpen)));
        ledger.close().unwrap();
        assert!(matches!(ledger.close(), Err(LibraryError::ClosedLibrary)));
    }
}
