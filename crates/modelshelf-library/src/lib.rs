#![forbid(unsafe_code)]
//! modelshelf-library: the model library facade.
//!
//! A [`ModelLibrary`] owns an association, a borrow ledger and one storage
//! strategy. Models are borrowed by index while the library is open and must
//! be shelved before it closes:
//!
//! ```ignore
//! let mut session = library.session()?;
//! let mut model = session.borrow(0)?;
//! // ... work on the model ...
//! session.shelve(model)?;
//! session.close()?;
//! ```

pub mod error;
pub mod hooks;
pub mod iter;
pub mod ledger;
pub mod library;
pub mod loan;
pub mod session;

pub use error::{BorrowError, LibraryError, Result, ShelveError};
pub use hooks::{FinalizeInfo, ResultFinalizer};
pub use iter::{MapModels, Models};
pub use ledger::{Ledger, SlotState};
pub use library::{LibraryInit, ModelLibrary};
pub use loan::Loan;
pub use session::Session;
