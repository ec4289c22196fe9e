use crate::{
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapId},
    resource::ResourceTracker,
    types::{Kind, PyTrait, clamp_slice},
    value::Value,
};

/// A fixed-length sequence of owned references.
///
/// The length is set at construction. Items may still be rebound with `set`.
#[derive(Debug)]
pub(crate) struct Tuple {
    items: Box<[Value]>,
}

impl Tuple {
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            items: items.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Rebinds the item at `index`, releasing the displaced value.
    ///
    /// An out-of-range index releases `value` and reports an index error.
    pub fn set(&mut self, index: usize, value: Value, heap: &mut Heap<impl ResourceTracker>) -> RunResult<()> {
        match self.items.get_mut(index) {
            Some(slot) => {
                std::mem::replace(slot, value).drop_with_heap(heap);
                Ok(())
            }
            None => {
                value.drop_with_heap(heap);
                Err(ExcType::index_error(Kind::Tuple))
            }
        }
    }

    /// Returns true when `[lo, hi)` clamps to the whole tuple.
    pub fn is_whole_range(&self, lo: i64, hi: i64) -> bool {
        clamp_slice(lo, hi, self.items.len()) == (0, self.items.len())
    }

    /// New tuple holding acquired references to the items in `[lo, hi)`.
    pub fn slice(&self, lo: i64, hi: i64, heap: &Heap<impl ResourceTracker>) -> Self {
        let (lo, hi) = clamp_slice(lo, hi, self.items.len());
        Self {
            items: self.items[lo..hi].iter().map(|v| v.clone_with_heap(heap)).collect(),
        }
    }

    pub fn concat(&self, other: &Self, heap: &Heap<impl ResourceTracker>) -> Self {
        Self {
            items: self
                .items
                .iter()
                .chain(other.items.iter())
                .map(|v| v.clone_with_heap(heap))
                .collect(),
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items.into_vec()
    }
}

impl PyTrait for Tuple {
    fn py_kind(&self) -> Kind {
        Kind::Tuple
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
