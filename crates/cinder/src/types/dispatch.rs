//! Operations shared across kinds: ordering, concatenation, indexing and slicing.
//!
//! Each is one `match` over [`HeapData`]. A kind without an arm for an operation
//! does not support it and the caller gets a `TypeError`.

use std::cmp::Ordering;

use crate::{
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapData, HeapId},
    resource::{MAX_DATA_RECURSION_DEPTH, ResourceTracker},
    types::{Kind, PyTrait, clamp_slice},
    value::Value,
};

/// Three-way comparison defining a total order over all objects.
///
/// Identical objects are equal. Objects of different kinds are ordered by kind name.
/// Numbers compare by value, strings by bytes, lists and tuples item by item and then
/// by length. Any other pair of the same kind is ordered by heap identity.
///
/// A NaN compares equal to every float, so the order is not transitive once a NaN
/// is involved (NaN == 1.0 and NaN == 2.0 while 1.0 < 2.0).
pub(crate) fn compare(heap: &Heap<impl ResourceTracker>, a: HeapId, b: HeapId) -> RunResult<Ordering> {
    compare_depth(heap, a, b, 0)
}

fn compare_depth(heap: &Heap<impl ResourceTracker>, a: HeapId, b: HeapId, depth: u16) -> RunResult<Ordering> {
    if a == b {
        return Ok(Ordering::Equal);
    }
    if depth > MAX_DATA_RECURSION_DEPTH {
        return Err(ExcType::runtime_error("maximum recursion depth exceeded in comparison"));
    }
    let (left, right) = (heap.get(a), heap.get(b));
    let (left_kind, right_kind) = (left.py_kind(), right.py_kind());
    if left_kind != right_kind {
        return Ok(left_kind.cmp_name(right_kind));
    }
    let ordering = match (left, right) {
        (HeapData::Int(x), HeapData::Int(y)) => x.cmp(y),
        (HeapData::Float(x), HeapData::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (HeapData::Str(x), HeapData::Str(y)) => x.as_bytes().cmp(y.as_bytes()),
        (HeapData::List(x), HeapData::List(y)) => return compare_items(heap, x.items(), y.items(), depth),
        (HeapData::Tuple(x), HeapData::Tuple(y)) => return compare_items(heap, x.items(), y.items(), depth),
        _ => a.cmp(&b),
    };
    Ok(ordering)
}

fn compare_items(heap: &Heap<impl ResourceTracker>, xs: &[Value], ys: &[Value], depth: u16) -> RunResult<Ordering> {
    for (x, y) in xs.iter().zip(ys) {
        let ordering = compare_depth(heap, x.id(), y.id(), depth + 1)?;
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }
    Ok(xs.len().cmp(&ys.len()))
}

/// `v + w` for the sequence kinds.
///
/// Strings and tuples share the non-empty operand when the other one is empty;
/// lists always produce a new list.
pub(crate) fn concat<T: ResourceTracker>(heap: &mut Heap<T>, v: &Value, w: &Value) -> RunResult<Value> {
    let data = {
        let heap_ref = &*heap;
        match (heap_ref.get(v.id()), heap_ref.get(w.id())) {
            (HeapData::Str(a), HeapData::Str(b)) => {
                if b.is_empty() {
                    return Ok(v.clone_with_heap(heap_ref));
                }
                if a.is_empty() {
                    return Ok(w.clone_with_heap(heap_ref));
                }
                HeapData::Str(a.concat(b))
            }
            (HeapData::Tuple(a), HeapData::Tuple(b)) => {
                if b.len() == 0 {
                    return Ok(v.clone_with_heap(heap_ref));
                }
                if a.len() == 0 {
                    return Ok(w.clone_with_heap(heap_ref));
                }
                HeapData::Tuple(a.concat(b, heap_ref))
            }
            (HeapData::List(a), HeapData::List(b)) => HeapData::List(a.concat(b, heap_ref)),
            (a, b) => {
                return Err(ExcType::type_error(format!(
                    "bad operand kinds for +: {} and {}",
                    a.py_kind(),
                    b.py_kind()
                )));
            }
        }
    };
    Ok(heap.allocate_value(data)?)
}

/// Resolves a possibly negative index against `len`.
pub(crate) fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len_i = i64::try_from(len).ok()?;
    let index = if index < 0 { index.checked_add(len_i)? } else { index };
    usize::try_from(index).ok().filter(|&i| i < len)
}

/// `v[index]` for strings, lists and tuples. Negative indices count from the end.
///
/// Indexing a string yields a new one-character string; lists and tuples hand
/// out a new reference to the stored item.
pub(crate) fn index<T: ResourceTracker>(heap: &mut Heap<T>, v: &Value, index: i64) -> RunResult<Value> {
    let data = {
        let heap_ref = &*heap;
        match heap_ref.get(v.id()) {
            HeapData::Str(s) => {
                let Some(c) = resolve_index(index, s.len()).and_then(|i| s.char_at(i)) else {
                    return Err(ExcType::index_error(Kind::Str));
                };
                HeapData::Str(c)
            }
            HeapData::List(l) => {
                return resolve_index(index, l.len())
                    .and_then(|i| l.get(i))
                    .map(|item| item.clone_with_heap(heap_ref))
                    .ok_or_else(|| ExcType::index_error(Kind::List));
            }
            HeapData::Tuple(t) => {
                return resolve_index(index, t.len())
                    .and_then(|i| t.get(i))
                    .map(|item| item.clone_with_heap(heap_ref))
                    .ok_or_else(|| ExcType::index_error(Kind::Tuple));
            }
            other => return Err(ExcType::type_error_unsupported("subscript", other.py_kind())),
        }
    };
    Ok(heap.allocate_value(data)?)
}

/// Item `position` of a sequence for `FOR_LOOP`, or None once the sequence is exhausted.
///
/// Exhaustion is not an error; a non-sequence is.
pub(crate) fn loop_item<T: ResourceTracker>(heap: &mut Heap<T>, v: &Value, position: usize) -> RunResult<Option<Value>> {
    let data = heap.get(v.id());
    if !data.is_sequence() {
        return Err(ExcType::type_error("loop over non-sequence"));
    }
    if data.py_len().is_some_and(|len| position >= len) {
        return Ok(None);
    }
    let position = i64::try_from(position).map_err(|_| ExcType::index_error(data.py_kind()))?;
    index(heap, v, position).map(Some)
}

/// `v[lo:hi]` for strings, lists and tuples.
///
/// A missing bound defaults to the start or end. A negative bound counts from the end
/// and the result is then clamped to `[0, len]`. A string or tuple slice covering the
/// whole sequence returns the input itself.
pub(crate) fn slice<T: ResourceTracker>(
    heap: &mut Heap<T>,
    v: &Value,
    lo: Option<i64>,
    hi: Option<i64>,
) -> RunResult<Value> {
    let data = {
        let heap_ref = &*heap;
        let seq = heap_ref.get(v.id());
        let Some(len) = seq.py_len().filter(|_| seq.is_sequence()) else {
            return Err(ExcType::type_error_unsupported("slice", seq.py_kind()));
        };
        let len_i = i64::try_from(len).unwrap_or(i64::MAX);
        let bound = |b: Option<i64>, default: i64| match b {
            None => default,
            Some(b) if b < 0 => b.saturating_add(len_i),
            Some(b) => b,
        };
        let (lo, hi) = (bound(lo, 0), bound(hi, len_i));

        match seq {
            HeapData::Str(s) => {
                if clamp_slice(lo, hi, len) == (0, len) {
                    return Ok(v.clone_with_heap(heap_ref));
                }
                HeapData::Str(s.slice(lo, hi))
            }
            HeapData::Tuple(t) => {
                if t.is_whole_range(lo, hi) {
                    return Ok(v.clone_with_heap(heap_ref));
                }
                HeapData::Tuple(t.slice(lo, hi, heap_ref))
            }
            HeapData::List(l) => HeapData::List(l.slice(lo, hi, heap_ref)),
            other => return Err(ExcType::type_error_unsupported("slice", other.py_kind())),
        }
    };
    Ok(heap.allocate_value(data)?)
}
