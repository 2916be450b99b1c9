//! Convenient re-exports for downstream crates.

pub use crate::association::{AssociationDescriptor, Member, Product};
pub use crate::config::{ConfigOverlay, LibraryConfig};
pub use crate::error::{Error, Result};
pub use crate::group::GroupIndex;
pub use crate::hash::Hash256;
pub use crate::id::{LibraryId, LoanSerial};
pub use crate::model::{CrdsParameters, DataModel, ModelFormat};
