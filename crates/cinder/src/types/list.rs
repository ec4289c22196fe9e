use crate::{
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapId},
    resource::{ResourceError, ResourceTracker},
    types::{Kind, PyTrait, clamp_slice},
    value::Value,
};

/// A mutable, ordered sequence of owned references.
///
/// Reads (`get`) hand out borrowed references; stores (`set`, `insert`, `append`)
/// take ownership of the value passed in. Mutation happens while the list is taken
/// out of its heap slot (`Heap::with_entry_mut`), so the list is never aliased while
/// it grows.
#[derive(Debug, Default)]
pub(crate) struct List {
    items: Vec<Value>,
}

impl List {
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Borrowed reference to the item at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Replaces the item at `index`, releasing the displaced value.
    ///
    /// An out-of-range index leaves the list untouched, releases `value` and
    /// reports an index error.
    pub fn set(&mut self, index: usize, value: Value, heap: &mut Heap<impl ResourceTracker>) -> RunResult<()> {
        match self.items.get_mut(index) {
            Some(slot) => {
                let old = std::mem::replace(slot, value);
                old.drop_with_heap(heap);
                Ok(())
            }
            None => {
                value.drop_with_heap(heap);
                Err(ExcType::index_error(Kind::List))
            }
        }
    }

    /// Inserts `value` before position `where_`, clamped to `[0, len]`.
    ///
    /// An index past the end appends.
    pub fn insert(
        &mut self,
        where_: i64,
        value: Value,
        heap: &mut Heap<impl ResourceTracker>,
    ) -> Result<(), ResourceError> {
        if let Err(err) = heap.on_container_insert() {
            value.drop_with_heap(heap);
            return Err(err);
        }
        let index = usize::try_from(where_.max(0)).unwrap_or(usize::MAX).min(self.items.len());
        self.items.insert(index, value);
        Ok(())
    }

    pub fn append(&mut self, value: Value, heap: &mut Heap<impl ResourceTracker>) -> Result<(), ResourceError> {
        if let Err(err) = heap.on_container_insert() {
            value.drop_with_heap(heap);
            return Err(err);
        }
        self.items.push(value);
        Ok(())
    }

    /// New list holding acquired references to the items in `[lo, hi)`.
    ///
    /// Bounds are clamped to `[0, len]` and `hi < lo` is treated as `hi = lo`.
    pub fn slice(&self, lo: i64, hi: i64, heap: &Heap<impl ResourceTracker>) -> Self {
        let (lo, hi) = clamp_slice(lo, hi, self.items.len());
        Self {
            items: self.items[lo..hi].iter().map(|v| v.clone_with_heap(heap)).collect(),
        }
    }

    /// New list holding the items of `self` followed by those of `other`.
    pub fn concat(&self, other: &Self, heap: &Heap<impl ResourceTracker>) -> Self {
        Self {
            items: self
                .items
                .iter()
                .chain(&other.items)
                .map(|v| v.clone_with_heap(heap))
                .collect(),
        }
    }

    /// Gives the items back to the caller, leaving the list empty.
    pub fn take_items(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.items)
    }
}

impl PyTrait for List {
    fn py_kind(&self) -> Kind {
        Kind::List
    }

    fn py_estimate_size(&self) -> usize {
        self.items.len() * std::mem::size_of::<Value>()
    }

    fn py_len(&self) -> Option<usize> {
        Some(self.items.len())
    }

    fn py_dec_ref_ids(&mut self, stack: &mut Vec<HeapId>) {
        for item in &mut self.items {
            item.push_child_id(stack);
        }
    }
}
