use std::{cell::Cell, collections::BTreeMap};

use crate::{
    resource::{ResourceError, ResourceTracker},
    types::{
        Class, ClassMember, ClassMethod, Code, Dict, Frame, Func, Kind, List, Method, Module, PyTrait, Str, Traceback,
        Tuple,
    },
    value::Value,
};

/// Snapshot of heap state: live objects, a per-kind breakdown and tracked memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Total number of live objects on the heap, including the pinned singletons.
    pub live_objects: usize,
    /// Live objects by kind name ("int", "list", "dictionary", ...).
    pub objects_by_kind: BTreeMap<&'static str, usize>,
    /// Tracked memory usage in bytes, if the tracker records it.
    pub tracker_memory_bytes: Option<usize>,
}

/// Unique identifier for objects stored inside the heap arena.
///
/// Identity comparison (`is`) is `HeapId` equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct HeapId(usize);

impl HeapId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Payload of a heap object: exactly one variant per object kind.
#[derive(Debug)]
pub(crate) enum HeapData {
    None,
    Int(i64),
    Float(f64),
    Str(Str),
    List(List),
    Tuple(Tuple),
    Dict(Dict),
    Module(Module),
    Func(Func),
    Method(Method),
    Class(Class),
    ClassMember(ClassMember),
    ClassMethod(ClassMethod),
    Code(Code),
    Frame(Frame),
    Traceback(Traceback),
}

impl HeapData {
    /// Returns true for the kinds that support indexing, slicing and iteration.
    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::Str(_) | Self::List(_) | Self::Tuple(_))
    }

    /// Truth value used by conditional jumps and `not`.
    ///
    /// Numbers are true when non-zero, sequences when non-empty and dicts when they hold
    /// entries. None is false and every other object is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::None => false,
            other => other.py_len().is_none_or(|len| len != 0),
        }
    }
}

impl PyTrait for HeapData {
    fn py_kind(&self) -> Kind {
        match self {
            Self::None => Kind::None,
            Self::Int(_) => Kind::Int,
            Self::Float(_) => Kind::Float,
            Self::Str(s) => s.py_kind(),
            Self::List(l) => l.py_kind(),
            Self::Tuple(t) => t.py_kind(),
            Self::Dict(d) => d.py_kind(),
            Self::Module(m) => m.py_kind(),
            Self::Func(f) => f.py_kind(),
            Self::Method(m) => m.py_kind(),
            Self::Class(c) => c.py_kind(),
            Self::ClassMember(c) => c.py_kind(),
            Self::ClassMethod(c) => c.py_kind(),
            Self::Code(c) => c.py_kind(),
            Self::Frame(f) => f.py_kind(),
            Self::Traceback(t) => t.py_kind(),
        }
    }

    fn py_estimate_size(&self) -> usize {
        let payload = match self {
            Self::None | Self::Int(_) | Self::Float(_) => 0,
            Self::Str(s) => s.py_estimate_size(),
            Self::List(l) => l.py_estimate_size(),
            Self::Tuple(t) => t.py_estimate_size(),
            Self::Dict(d) => d.py_estimate_size(),
            Self::Module(m) => m.py_estimate_size(),
            Self::Func(f) => f.py_estimate_size(),
            Self::Method(m) => m.py_estimate_size(),
            Self::Class(c) => c.py_estimate_size(),
            Self::ClassMember(c) => c.py_estimate_size(),
            Self::ClassMethod(c) => c.py_estimate_size(),
            Self::Code(c) => c.py_estimate_size(),
            Self::Frame(f) => f.py_estimate_size(),
            Self::Traceback(t) => t.py_estimate_size(),
        };
        std::mem::size_of::<Self>() + payload
    }

    fn py_len(&self) -> Option<usize> {
        match self {
            Self::Str(s) => s.py_len(),
            Self::List(l) => l.py_len(),
            Self::Tuple(t) => t.py_len(),
            Self::Dict(d) => d.py_len(),
            _ => None,
        }
    }

    fn py_dec_ref_ids(&mut self, stack: &mut Vec<HeapId>) {
        match self {
            Self::None | Self::Int(_) | Self::Float(_) | Self::Str(_) => {}
            Self::List(l) => l.py_dec_ref_ids(stack),
            Self::Tuple(t) => t.py_dec_ref_ids(stack),
            Self::Dict(d) => d.py_dec_ref_ids(stack),
            Self::Module(m) => m.py_dec_ref_ids(stack),
            Self::Func(f) => f.py_dec_ref_ids(stack),
            Self::Method(m) => m.py_dec_ref_ids(stack),
            Self::Class(c) => c.py_dec_ref_ids(stack),
            Self::ClassMember(c) => c.py_dec_ref_ids(stack),
            Self::ClassMethod(c) => c.py_dec_ref_ids(stack),
            Self::Code(c) => c.py_dec_ref_ids(stack),
            Self::Frame(f) => f.py_dec_ref_ids(stack),
            Self::Traceback(t) => t.py_dec_ref_ids(stack),
        }
    }
}

/// A single arena slot.
///
/// The `data` field is an Option to support temporary borrowing: `with_entry_mut`
/// takes the payload out (leaving `None`), hands `&mut Heap` to the closure and then
/// restores it. The refcount stays reachable for `inc_ref`/`dec_ref` in the meantime.
#[derive(Debug)]
pub(crate) struct HeapValue {
    refcount: Cell<usize>,
    data: Option<HeapData>,
}

/// Reference-counted arena that backs every runtime object.
///
/// Uses a free list to reuse slots from freed objects, so long-running loops that
/// allocate and free integers keep the arena size constant.
///
/// Three pinned singletons (None, True and False) are created with the heap and
/// hold one reference owned by the heap itself, so releasing them never frees them.
///
/// Generic over `T: ResourceTracker`. With `NoLimitTracker` all checks compile away.
#[derive(Debug)]
pub(crate) struct Heap<T: ResourceTracker> {
    entries: Vec<Option<HeapValue>>,
    /// IDs of freed slots available for reuse. Populated by `dec_ref`, consumed by `allocate`.
    free_list: Vec<HeapId>,
    tracker: T,
    /// False while the interpreter builds its bring-up objects, which are never charged.
    tracking: bool,
    none_id: HeapId,
    true_id: HeapId,
    false_id: HeapId,
}

macro_rules! take_data {
    ($self:ident, $id:expr, $func_name:literal) => {
        $self
            .entries
            .get_mut($id.index())
            .expect(concat!("Heap::", $func_name, ": slot missing"))
            .as_mut()
            .expect(concat!("Heap::", $func_name, ": object already freed"))
            .data
            .take()
            .expect(concat!("Heap::", $func_name, ": data already borrowed"))
    };
}

macro_rules! restore_data {
    ($self:ident, $id:expr, $new_data:expr, $func_name:literal) => {{
        let entry = $self
            .entries
            .get_mut($id.index())
            .expect(concat!("Heap::", $func_name, ": slot missing"))
            .as_mut()
            .expect(concat!("Heap::", $func_name, ": object already freed"));
        entry.data = Some($new_data);
    }};
}

impl<T: ResourceTracker> Heap<T> {
    /// Creates a new heap with the given resource tracker.
    ///
    /// The None/True/False singletons are placed in the first three slots without
    /// consulting the tracker: they are part of interpreter bring-up, not user allocations.
    pub fn new(capacity: usize, tracker: T) -> Self {
        let mut entries = Vec::with_capacity(capacity.max(3));
        for data in [HeapData::None, HeapData::Int(1), HeapData::Int(0)] {
            entries.push(Some(HeapValue {
                refcount: Cell::new(1),
                data: Some(data),
            }));
        }
        Self {
            entries,
            free_list: Vec::new(),
            tracker,
            tracking: true,
            none_id: HeapId(0),
            true_id: HeapId(1),
            false_id: HeapId(2),
        }
    }

    /// Returns a reference to the resource tracker.
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Returns a mutable reference to the resource tracker.
    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    /// Turns tracker charging on or off. Only interpreter bring-up turns it off.
    pub fn set_tracking(&mut self, tracking: bool) {
        self.tracking = tracking;
    }

    /// Charges one allocation unit for growing an existing container in place.
    pub fn on_container_insert(&mut self) -> Result<(), ResourceError> {
        if self.tracking {
            self.tracker.on_container_insert()
        } else {
            Ok(())
        }
    }

    /// Asks the tracker whether a table of `bytes` may be built.
    pub fn check_large_result(&self, bytes: usize) -> Result<(), ResourceError> {
        if self.tracking {
            self.tracker.check_large_result(bytes)
        } else {
            Ok(())
        }
    }

    /// Returns a new reference to the None singleton.
    pub fn none(&self) -> Value {
        self.inc_ref(self.none_id);
        Value::Ref(self.none_id)
    }

    /// Returns a new reference to the True or False singleton.
    pub fn bool_value(&self, b: bool) -> Value {
        let id = if b { self.true_id } else { self.false_id };
        self.inc_ref(id);
        Value::Ref(id)
    }

    /// Returns true if `id` is the None singleton.
    #[inline]
    pub fn is_none(&self, id: HeapId) -> bool {
        id == self.none_id
    }

    /// Allocates a new heap entry with refcount 1, returning the raw ID.
    ///
    /// The tracker is consulted first; a refusal surfaces as a `ResourceError`, after
    /// the references `data` owned have been released.
    pub fn allocate(&mut self, mut data: HeapData) -> Result<HeapId, ResourceError> {
        if self.tracking
            && let Err(err) = self.tracker.on_allocate(|| data.py_estimate_size())
        {
            let mut child_ids = Vec::new();
            data.py_dec_ref_ids(&mut child_ids);
            drop(data);
            for child_id in child_ids {
                self.dec_ref(child_id);
            }
            return Err(err);
        }

        let new_entry = HeapValue {
            refcount: Cell::new(1),
            data: Some(data),
        };

        let id = if let Some(id) = self.free_list.pop() {
            self.entries[id.index()] = Some(new_entry);
            id
        } else {
            let id = self.entries.len();
            self.entries.push(Some(new_entry));
            HeapId(id)
        };

        Ok(id)
    }

    /// Allocates a new heap entry and wraps it in an owning `Value`.
    pub fn allocate_value(&mut self, data: HeapData) -> Result<Value, ResourceError> {
        self.allocate(data).map(Value::Ref)
    }

    /// Increments the reference count for an existing heap entry.
    ///
    /// Uses interior mutability for the refcount, so only shared access to the heap
    /// is required.
    ///
    /// # Panics
    /// Panics if the ID is invalid or the object has already been freed.
    pub fn inc_ref(&self, id: HeapId) {
        let value = self
            .entries
            .get(id.index())
            .expect("Heap::inc_ref: slot missing")
            .as_ref()
            .expect("Heap::inc_ref: object already freed");
        value.refcount.set(value.refcount.get() + 1);
    }

    /// Decrements the reference count and frees the object (plus children) once it hits zero.
    ///
    /// When an object is freed its slot ID is added to the free list, the tracker is told
    /// about the released memory, and every reference the payload owned is released in turn.
    /// Children are released from a work list, so nesting depth is bounded by memory only.
    ///
    /// # Panics
    /// Panics if the ID is invalid or the object has already been freed.
    pub fn dec_ref(&mut self, id: HeapId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let value = {
                let slot = self.entries.get_mut(id.index()).expect("Heap::dec_ref: slot missing");
                let entry = slot.as_mut().expect("Heap::dec_ref: object already freed");
                let count = entry.refcount.get();
                if count > 1 {
                    entry.refcount.set(count - 1);
                    continue;
                }
                slot.take().expect("Heap::dec_ref: object already freed")
            };

            self.free_list.push(id);

            if let Some(mut data) = value.data {
                self.tracker.on_free(|| data.py_estimate_size());
                data.py_dec_ref_ids(&mut pending);
            }
        }
    }

    /// Returns an immutable reference to the heap data stored at the given ID.
    ///
    /// # Panics
    /// Panics if the ID is invalid, the object has already been freed,
    /// or the data is currently borrowed via `with_entry_mut`.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        self.entries
            .get(id.index())
            .expect("Heap::get: slot missing")
            .as_ref()
            .expect("Heap::get: object already freed")
            .data
            .as_ref()
            .expect("Heap::get: data currently borrowed")
    }

    /// Returns a mutable reference to the heap data stored at the given ID.
    ///
    /// # Panics
    /// Panics if the ID is invalid, the object has already been freed,
    /// or the data is currently borrowed via `with_entry_mut`.
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        self.entries
            .get_mut(id.index())
            .expect("Heap::get_mut: slot missing")
            .as_mut()
            .expect("Heap::get_mut: object already freed")
            .data
            .as_mut()
            .expect("Heap::get_mut: data currently borrowed")
    }

    /// Returns the kind of the object stored at `id`.
    #[inline]
    pub fn kind(&self, id: HeapId) -> Kind {
        self.get(id).py_kind()
    }

    /// Gives mutable access to a heap entry while allowing reentrant heap usage
    /// inside the closure (e.g. to release displaced values or allocate results).
    ///
    /// The data is temporarily taken from the heap entry and restored after the
    /// closure completes.
    pub fn with_entry_mut<F, R>(&mut self, id: HeapId, f: F) -> R
    where
        F: FnOnce(&mut Self, &mut HeapData) -> R,
    {
        let mut data = take_data!(self, id, "with_entry_mut");

        let result = f(self, &mut data);

        restore_data!(self, id, data, "with_entry_mut");
        result
    }

    /// Returns the reference count for the heap entry at the given ID.
    ///
    /// # Panics
    /// Panics if the ID is invalid or the object has already been freed.
    #[must_use]
    pub fn get_refcount(&self, id: HeapId) -> usize {
        self.entries
            .get(id.index())
            .expect("Heap::get_refcount: slot missing")
            .as_ref()
            .expect("Heap::get_refcount: object already freed")
            .refcount
            .get()
    }

    /// Returns true while the slot at `id` holds a live object.
    #[must_use]
    pub fn is_live(&self, id: HeapId) -> bool {
        self.entries.get(id.index()).is_some_and(Option::is_some)
    }

    /// Returns a snapshot of the current heap state.
    pub fn heap_stats(&self) -> HeapStats {
        let mut objects_by_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
        let live = self.entries.iter().flatten();
        for data in live.clone().filter_map(|entry| entry.data.as_ref()) {
            *objects_by_kind.entry(data.py_kind().into()).or_insert(0) += 1;
        }

        HeapStats {
            live_objects: live.count(),
            objects_by_kind,
            tracker_memory_bytes: self.tracker.current_memory_bytes(),
        }
    }

    /// Number of live entries, excluding the three pinned singletons.
    #[must_use]
    #[cfg(feature = "ref-count-return")]
    pub fn entry_count(&self) -> usize {
        self.entries.iter().filter(|o| o.is_some()).count().saturating_sub(3)
    }
}

/// Drop implementation for Heap that marks all contained Values as Dereferenced
/// before dropping to prevent panics when the `ref-count-panic` feature is enabled.
#[cfg(feature = "ref-count-panic")]
impl<T: ResourceTracker> Drop for Heap<T> {
    fn drop(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let mut dummy_stack = Vec::new();
        for value in self.entries.iter_mut().flatten() {
            if let Some(data) = &mut value.data {
                data.py_dec_ref_ids(&mut dummy_stack);
            }
        }
    }
}

/// Trait for types that require heap access for proper cleanup.
///
/// Rust's standard `Drop` trait cannot decrement heap reference counts because it has no
/// access to the `Heap`. This trait provides an explicit drop-with-heap method so that
/// ref-counted values (and containers of them) release their counts when discarded.
///
/// Every value of an implementing type must be released on every code path.
pub(crate) trait DropWithHeap<T: ResourceTracker> {
    /// Consume `self` and decrement reference counts for any heap objects contained within.
    fn drop_with_heap(self, heap: &mut Heap<T>);
}

impl<T: ResourceTracker> DropWithHeap<T> for Value {
    #[inline]
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        Self::drop_with_heap(self, heap);
    }
}

impl<T: ResourceTracker, U: DropWithHeap<T>> DropWithHeap<T> for Option<U> {
    #[inline]
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        if let Some(value) = self {
            value.drop_with_heap(heap);
        }
    }
}

impl<T: ResourceTracker, U: DropWithHeap<T>> DropWithHeap<T> for Vec<U> {
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        for value in self {
            value.drop_with_heap(heap);
        }
    }
}

impl<T: ResourceTracker> DropWithHeap<T> for (Value, Value) {
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        let (first, second) = self;
        first.drop_with_heap(heap);
        second.drop_with_heap(heap);
    }
}

impl<T: ResourceTracker> DropWithHeap<T> for Dict {
    fn drop_with_heap(mut self, heap: &mut Heap<T>) {
        self.drop_all_entries(heap);
    }
}

impl<T: ResourceTracker> DropWithHeap<T> for Tuple {
    fn drop_with_heap(self, heap: &mut Heap<T>) {
        self.into_items().drop_with_heap(heap);
    }
}

impl<T: ResourceTracker> DropWithHeap<T> for List {
    fn drop_with_heap(mut self, heap: &mut Heap<T>) {
        self.take_items().drop_with_heap(heap);
    }
}
