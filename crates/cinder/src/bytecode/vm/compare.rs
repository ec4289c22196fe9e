//! `COMPARE_OP`.

use std::cmp::Ordering;

use super::Interpreter;
use crate::{
    bytecode::op::CompareOp,
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapData},
    resource::ResourceTracker,
    tracer::VmTracer,
    types::dispatch,
    value::Value,
};

impl<T: ResourceTracker, Tr: VmTracer> Interpreter<T, Tr> {
    /// Pops `w` then `v` and pushes the boolean `v cmp w`.
    pub(super) fn compare_op(&mut self, cmp: CompareOp) -> RunResult<()> {
        let (v, w) = self.pop2()?;
        let outcome = compare_values(&self.heap, cmp, &v, &w);
        v.drop_with_heap(&mut self.heap);
        w.drop_with_heap(&mut self.heap);
        let result = self.heap.bool_value(outcome?);
        self.push(result);
        Ok(())
    }
}

fn compare_values(heap: &Heap<impl ResourceTracker>, cmp: CompareOp, v: &Value, w: &Value) -> RunResult<bool> {
    let ordering = || dispatch::compare(heap, v.id(), w.id());
    Ok(match cmp {
        CompareOp::Is => v.is(w),
        CompareOp::IsNot => !v.is(w),
        CompareOp::In => contains(heap, w, v)?,
        CompareOp::NotIn => !contains(heap, w, v)?,
        CompareOp::ExcMatch => exception_matches(heap, v, w),
        CompareOp::Lt => ordering()? == Ordering::Less,
        CompareOp::Le => ordering()? != Ordering::Greater,
        CompareOp::Eq => ordering()? == Ordering::Equal,
        CompareOp::Ne => ordering()? != Ordering::Equal,
        CompareOp::Gt => ordering()? == Ordering::Greater,
        CompareOp::Ge => ordering()? != Ordering::Less,
    })
}

/// Membership test: `item in seq`.
fn contains(heap: &Heap<impl ResourceTracker>, seq: &Value, item: &Value) -> RunResult<bool> {
    let items = match heap.get(seq.id()) {
        HeapData::Str(s) => {
            let HeapData::Str(c) = heap.get(item.id()) else {
                return Err(ExcType::type_error("string member test needs char left operand"));
            };
            let &[c] = c.as_bytes() else {
                return Err(ExcType::type_error("string member test needs char left operand"));
            };
            return Ok(s.as_bytes().contains(&c));
        }
        HeapData::List(l) => l.items(),
        HeapData::Tuple(t) => t.items(),
        _ => return Err(ExcType::type_error("'in' or 'not in' needs sequence right argument")),
    };
    for candidate in items {
        if dispatch::compare(heap, candidate.id(), item.id())? == Ordering::Equal {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `EXC_MATCH`: the raised error is the handler's error, or one of a tuple of them.
///
/// Errors are singletons, so matching is identity.
fn exception_matches(heap: &Heap<impl ResourceTracker>, exc: &Value, pattern: &Value) -> bool {
    if exc.is(pattern) {
        return true;
    }
    match heap.get(pattern.id()) {
        HeapData::Tuple(t) => t.items().iter().any(|item| item.is(exc)),
        _ => false,
    }
}
