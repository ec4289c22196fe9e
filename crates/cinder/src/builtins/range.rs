use crate::{
    exception_private::{ExcType, RunResult},
    heap::{DropWithHeap, Heap, HeapData},
    resource::ResourceTracker,
    types::List,
    value::Value,
};

/// `range(hi)`, `range((lo, hi))` or `range((lo, hi, step))`: a list of ints.
pub(super) fn range<T: ResourceTracker>(heap: &mut Heap<T>, arg: Option<Value>) -> RunResult<Value> {
    let bounds = arg.as_ref().and_then(|arg| read_bounds(heap, arg));
    arg.drop_with_heap(heap);
    let Some((lo, hi, step)) = bounds else {
        return Err(ExcType::type_error("range() requires 1-3 int arguments"));
    };
    if step == 0 {
        return Err(ExcType::runtime_error("zero step for range()"));
    }

    let count = range_len(lo, hi, step);
    heap.check_large_result(count.saturating_mul(size_of::<Value>()))?;
    let mut items = Vec::with_capacity(count.min(1024));
    let mut current = lo;
    for _ in 0..count {
        match heap.allocate_value(HeapData::Int(current)) {
            Ok(item) => items.push(item),
            Err(err) => {
                items.drop_with_heap(heap);
                return Err(err.into());
            }
        }
        current = current.wrapping_add(step);
    }
    Ok(heap.allocate_value(HeapData::List(List::from_vec(items)))?)
}

/// Reads `hi`, or a tuple of `(hi)`, `(lo, hi)` or `(lo, hi, step)`.
fn read_bounds(heap: &Heap<impl ResourceTracker>, arg: &Value) -> Option<(i64, i64, i64)> {
    let int = |v: &Value| match heap.get(v.id()) {
        HeapData::Int(i) => Some(*i),
        _ => None,
    };
    match heap.get(arg.id()) {
        HeapData::Int(hi) => Some((0, *hi, 1)),
        HeapData::Tuple(t) => match t.items() {
            [hi] => Some((0, int(hi)?, 1)),
            [lo, hi] => Some((int(lo)?, int(hi)?, 1)),
            [lo, hi, step] => Some((int(lo)?, int(hi)?, int(step)?)),
            _ => None,
        },
        _ => None,
    }
}

/// Number of items in the range; zero when the bounds are the wrong way round.
fn range_len(lo: i64, hi: i64, step: i64) -> usize {
    let (lo, hi, step) = (i128::from(lo), i128::from(hi), i128::from(step));
    let count = if step > 0 {
        (hi - lo + step - 1) / step
    } else {
        (hi - lo + step + 1) / step
    };
    usize::try_from(count.max(0)).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn range_lengths() {
        assert_eq!(range_len(0, 5, 1), 5);
        assert_eq!(range_len(0, 5, 2), 3);
        assert_eq!(range_len(5, 0, -1), 5);
        assert_eq!(range_len(5, 0, -2), 3);
        assert_eq!(range_len(5, 0, 1), 0);
        assert_eq!(range_len(0, 0, 1), 0);
    }
}
