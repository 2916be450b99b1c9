#![forbid(unsafe_code)]
//! modelshelf-io: a reference data-model collaborator.
//!
//! [`JsonModel`] is a metadata map plus an opaque payload stored as one JSON
//! document; [`JsonFormat`] supplies the open/group-id hooks a
//! `ModelLibrary` needs.

pub mod format;
pub mod model;

pub use format::JsonFormat;
pub use model::JsonModel;
