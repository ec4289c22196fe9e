use crate::{
    heap::{Heap, HeapId},
    resource::ResourceTracker,
};

/// Owning handle to one heap object.
///
/// Every runtime object lives in the [`Heap`] arena; a `Value` is one counted
/// reference to it. Holding a `Value` means owning one unit of the object's
/// reference count, so the handle must be handed back with `drop_with_heap()`
/// (release) or moved into a container that takes ownership of it.
///
/// NOTE: `Clone` is intentionally NOT derived. Use `clone_with_heap()`, which
/// increments the count (acquire). Direct cloning would bypass reference counting.
///
/// Borrowed references are plain `&Value` or a bare [`HeapId`].
#[derive(Debug, PartialEq, Eq)]
pub enum Value {
    /// A counted reference to a heap object.
    Ref(HeapId),
    /// Marker left behind once a value has been released, used to detect reference counting bugs.
    #[cfg(feature = "ref-count-panic")]
    Dereferenced,
}

impl Value {
    /// Returns the heap id this handle refers to.
    ///
    /// Two values are the same object (`is`) exactly when their ids are equal.
    ///
    /// # Panics
    /// With `ref-count-panic`, panics if the value was already released.
    #[inline]
    #[must_use]
    pub fn id(&self) -> HeapId {
        match self {
            Self::Ref(id) => *id,
            #[cfg(feature = "ref-count-panic")]
            Self::Dereferenced => panic!("Value::id called on a released value"),
        }
    }

    /// Returns true if both handles refer to the same heap object.
    #[inline]
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Acquires another reference to the same object.
    pub(crate) fn clone_with_heap(&self, heap: &Heap<impl ResourceTracker>) -> Self {
        let id = self.id();
        heap.inc_ref(id);
        Self::Ref(id)
    }

    /// Releases this reference, freeing the object (and any children) when the
    /// count reaches zero.
    ///
    /// # Important
    /// This method MUST be called before overwriting a slot or discarding a value
    /// to prevent memory leaks.
    #[cfg(not(feature = "ref-count-panic"))]
    #[inline]
    pub(crate) fn drop_with_heap(self, heap: &mut Heap<impl ResourceTracker>) {
        let Self::Ref(id) = self;
        heap.dec_ref(id);
    }

    /// With `ref-count-panic` enabled, the handle is replaced with `Dereferenced` and
    /// the original is forgotten to prevent the Drop impl from panicking.
    #[cfg(feature = "ref-count-panic")]
    pub(crate) fn drop_with_heap(mut self, heap: &mut Heap<impl ResourceTracker>) {
        let old = std::mem::replace(&mut self, Self::Dereferenced);
        if let Self::Ref(id) = &old {
            heap.dec_ref(*id);
            std::mem::forget(old);
        }
    }

    /// Hands this reference's id to the heap's child-release stack.
    ///
    /// Used by `py_dec_ref_ids` implementations: the payload is being destroyed,
    /// and the heap releases each collected id afterwards.
    #[inline]
    pub(crate) fn push_child_id(&mut self, stack: &mut Vec<HeapId>) {
        stack.push(self.id());
        #[cfg(feature = "ref-count-panic")]
        self.dec_ref_forget();
    }

    /// Marks this value as released without touching the heap.
    ///
    /// Only used when the caller has already accounted for the reference.
    #[cfg(feature = "ref-count-panic")]
    pub(crate) fn dec_ref_forget(&mut self) {
        let old = std::mem::replace(self, Self::Dereferenced);
        std::mem::forget(old);
    }
}

/// With `ref-count-panic` enabled, dropping a handle that still owns a reference
/// is a bug: the count would never be decremented.
#[cfg(feature = "ref-count-panic")]
impl Drop for Value {
    fn drop(&mut self) {
        if let Self::Ref(id) = self {
            panic!("Value::Ref({id:?}) dropped without calling drop_with_heap() - this is a reference counting bug");
        }
    }
}
