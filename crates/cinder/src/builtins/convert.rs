//! Numeric conversions.

use crate::{
    exception_private::{ExcType, RunResult},
    heap::{DropWithHeap, Heap, HeapData},
    resource::ResourceTracker,
    value::Value,
};

enum Number {
    Int(i64),
    Float(f64),
    Other,
}

fn read_number(heap: &Heap<impl ResourceTracker>, arg: Option<&Value>) -> Number {
    match arg.map(|v| heap.get(v.id())) {
        Some(HeapData::Int(i)) => Number::Int(*i),
        Some(HeapData::Float(f)) => Number::Float(*f),
        _ => Number::Other,
    }
}

/// `float(x)`: a float is returned as is, an int converts.
pub(super) fn float<T: ResourceTracker>(heap: &mut Heap<T>, arg: Option<Value>) -> RunResult<Value> {
    match read_number(heap, arg.as_ref()) {
        Number::Float(_) => arg.ok_or_else(ExcType::badcall),
        Number::Int(i) => {
            arg.drop_with_heap(heap);
            Ok(heap.allocate_value(HeapData::Float(i as f64))?)
        }
        Number::Other => {
            arg.drop_with_heap(heap);
            Err(ExcType::type_error("float() argument must be float or int"))
        }
    }
}

/// `int(x)`: an int is returned as is, a float truncates toward zero.
#[expect(clippy::cast_possible_truncation, reason = "out-of-range floats saturate")]
pub(super) fn int<T: ResourceTracker>(heap: &mut Heap<T>, arg: Option<Value>) -> RunResult<Value> {
    match read_number(heap, arg.as_ref()) {
        Number::Int(_) => arg.ok_or_else(ExcType::badcall),
        Number::Float(f) => {
            arg.drop_with_heap(heap);
            Ok(heap.allocate_value(HeapData::Int(f as i64))?)
        }
        Number::Other => {
            arg.drop_with_heap(heap);
            Err(ExcType::type_error("int() argument must be float or int"))
        }
    }
}

/// `notv(x)`: logical not of an int.
pub(super) fn notv<T: ResourceTracker>(heap: &mut Heap<T>, arg: Option<Value>) -> RunResult<Value> {
    let number = read_number(heap, arg.as_ref());
    arg.drop_with_heap(heap);
    match number {
        Number::Int(i) => Ok(heap.bool_value(i == 0)),
        _ => Err(ExcType::badarg()),
    }
}
