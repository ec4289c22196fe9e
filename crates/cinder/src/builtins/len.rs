use crate::{
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapData},
    resource::ResourceTracker,
    types::PyTrait,
    value::Value,
};

/// `len(x)`: the length of a sequence, or the used-entry count of a dict.
pub(super) fn len<T: ResourceTracker>(heap: &mut Heap<T>, arg: Option<Value>) -> RunResult<Value> {
    let Some(arg) = arg else {
        return Err(ExcType::type_error("len() without argument"));
    };
    let data = heap.get(arg.id());
    let len = if data.is_sequence() || matches!(data, HeapData::Dict(_)) {
        data.py_len()
    } else {
        None
    };
    arg.drop_with_heap(heap);
    let Some(len) = len else {
        return Err(ExcType::type_error("len() of unsized object"));
    };
    let len = i64::try_from(len).map_err(|_| ExcType::runtime_error("length too large"))?;
    Ok(heap.allocate_value(HeapData::Int(len))?)
}
