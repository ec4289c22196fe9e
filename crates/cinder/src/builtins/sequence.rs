//! In-place list mutation.

use crate::{
    exception_private::{ExcType, RunError, RunResult},
    heap::{DropWithHeap, Heap, HeapData, HeapId},
    resource::{ResourceError, ResourceTracker},
    types::List,
    value::Value,
};

/// `append((list, x))`.
pub(super) fn append<T: ResourceTracker>(heap: &mut Heap<T>, arg: Option<Value>) -> RunResult<Value> {
    let heap_ref = &*heap;
    let target = arg.as_ref().and_then(|arg| match heap_ref.get(arg.id()) {
        HeapData::Tuple(t) => match t.items() {
            [list, item] if matches!(heap_ref.get(list.id()), HeapData::List(_)) => {
                Some((list.id(), item.clone_with_heap(heap_ref)))
            }
            _ => None,
        },
        _ => None,
    });
    // the tuple keeps the list alive until the item is in place
    let result = match target {
        Some((list, item)) => mutate_list(heap, list, |list, heap| list.append(item, heap)),
        None => Err(ExcType::badarg()),
    };
    arg.drop_with_heap(heap);
    result.map(|()| heap.none())
}

/// `insert((list, index, x))`: inserts before `index`, clamped to the list bounds.
pub(super) fn insert<T: ResourceTracker>(heap: &mut Heap<T>, arg: Option<Value>) -> RunResult<Value> {
    let heap_ref = &*heap;
    let target = arg.as_ref().and_then(|arg| match heap_ref.get(arg.id()) {
        HeapData::Tuple(t) => match t.items() {
            [list, index, item] => match (heap_ref.get(list.id()), heap_ref.get(index.id())) {
                (HeapData::List(_), HeapData::Int(i)) => Some((list.id(), *i, item.clone_with_heap(heap_ref))),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    });
    let result = match target {
        Some((list, index, item)) => mutate_list(heap, list, |list, heap| list.insert(index, item, heap)),
        None => Err(ExcType::badarg()),
    };
    arg.drop_with_heap(heap);
    result.map(|()| heap.none())
}

fn mutate_list<T: ResourceTracker>(
    heap: &mut Heap<T>,
    id: HeapId,
    f: impl FnOnce(&mut List, &mut Heap<T>) -> Result<(), ResourceError>,
) -> RunResult<()> {
    heap.with_entry_mut(id, |heap, data| match data {
        HeapData::List(list) => f(list, heap).map_err(RunError::from),
        _ => Err(ExcType::badcall()),
    })
}
