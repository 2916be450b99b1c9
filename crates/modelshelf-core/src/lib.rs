#![forbid(unsafe_code)]
//! modelshelf-core: association manifests, group indexing, the data-model
//! collaborator traits, configuration, and hashing.
//!
//! No storage strategy or borrow bookkeeping lives here; those are in
//! `modelshelf-store` and `modelshelf-library`.

pub mod association;
pub mod config;
pub mod error;
pub mod group;
pub mod hash;
pub mod id;
pub mod model;
pub mod prelude;

pub use config::{ConfigOverlay, LibraryConfig};
pub use error::{Error, Result};

/// Crate version, stamped into saved associations.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
