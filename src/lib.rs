#![forbid(unsafe_code)]
//! modelshelf: borrow/shelve access to the models of a calibration association.
//!
//! Thin facade over the workspace crates; most users only need [`ModelLibrary`]
//! and a [`ModelFormat`] implementation such as [`JsonFormat`].

pub use modelshelf_core as shelf_core;
pub use modelshelf_io as io;
pub use modelshelf_library as library;
pub use modelshelf_store as store;

pub use modelshelf_core::prelude::*;
pub use modelshelf_io::{JsonFormat, JsonModel};
pub use modelshelf_library::{
    BorrowError, FinalizeInfo, LibraryError, LibraryInit, Loan, MapModels, ModelLibrary, Models,
    ResultFinalizer, Session, ShelveError,
};
pub use modelshelf_store::{StoreKind, StoreStats};
