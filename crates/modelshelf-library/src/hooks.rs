//! Step-side hooks invoked by the library.

use modelshelf_core::error::Result;

/// Context for one `finalize_result` call.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeInfo<'a> {
    pub index: usize,
    pub group_id: &'a str,
    pub reference_files_used: &'a [String],
}

/// Per-model completion hook run by `ModelLibrary::finalize_result`.
pub trait ResultFinalizer<M> {
    fn finalize_result(&mut self, model: &mut M, info: &FinalizeInfo<'_>) -> Result<()>;
}

impl<M, G> ResultFinalizer<M> for G
where
    G: FnMut(&mut M, &FinalizeInfo<'_>) -> Result<()>,
{
    fn finalize_result(&mut self, model: &mut M, info: &FinalizeInfo<'_>) -> Result<()> {
        self(model, info)
    }
}
