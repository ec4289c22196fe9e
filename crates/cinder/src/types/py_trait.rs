use crate::{heap::HeapId, types::Kind};

/// Per-kind behaviour every heap payload provides.
///
/// Operations that need the heap (compare, concatenate, index, slice) are
/// dispatched by matching on `HeapData` in the interpreter; this trait covers what
/// the heap itself needs to account for and destroy an object.
pub(crate) trait PyTrait {
    /// The object's kind.
    fn py_kind(&self) -> Kind;

    /// Approximate payload size in bytes, excluding the `HeapData` enum itself.
    ///
    /// Used by the resource tracker for memory limits.
    fn py_estimate_size(&self) -> usize;

    /// Number of elements, for kinds that have a length.
    fn py_len(&self) -> Option<usize> {
        None
    }

    /// Collects the heap ids of every reference this payload owns.
    ///
    /// Called once, when the object is destroyed; the heap then releases each id.
    fn py_dec_ref_ids(&mut self, stack: &mut Vec<HeapId>);
}
