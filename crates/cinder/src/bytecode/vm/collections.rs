//! Subscript, slice and unpack opcodes.

use super::Interpreter;
use crate::{
    exception_private::{ExcType, RunResult},
    heap::{DropWithHeap, Heap, HeapData},
    resource::ResourceTracker,
    tracer::VmTracer,
    types::{Kind, PyTrait, dict_insert, dispatch},
    value::Value,
};

/// Where `STORE_SUBSCR` writes.
enum Slot {
    Index(i64),
    Key(Box<[u8]>),
}

impl<T: ResourceTracker, Tr: VmTracer> Interpreter<T, Tr> {
    /// `BINARY_SUBSCR`: pops `w` then `v` and pushes `v[w]`.
    pub(super) fn subscript(&mut self) -> RunResult<()> {
        let (v, w) = self.pop2()?;
        let result = subscript_value(&mut self.heap, &v, &w);
        v.drop_with_heap(&mut self.heap);
        w.drop_with_heap(&mut self.heap);
        self.push(result?);
        Ok(())
    }

    /// `STORE_SUBSCR`: pops `w`, `v` and `u`, then `v[w] = u`.
    pub(super) fn store_subscript(&mut self) -> RunResult<()> {
        let (u, v, w) = self.pop3()?;
        let slot = match (self.heap.get(v.id()), self.heap.get(w.id())) {
            (HeapData::List(_), HeapData::Int(i)) => Ok(Slot::Index(*i)),
            (HeapData::Dict(_), HeapData::Str(key)) => Ok(Slot::Key(key.as_bytes().into())),
            (HeapData::List(_) | HeapData::Dict(_), key) => Err(ExcType::type_error(format!(
                "bad subscript kind for assignment: {}",
                key.py_kind()
            ))),
            (other, _) => Err(ExcType::type_error_unsupported("subscript assignment", other.py_kind())),
        };
        w.drop_with_heap(&mut self.heap);

        let result = match slot {
            Ok(Slot::Index(index)) => self.heap.with_entry_mut(v.id(), |heap, data| {
                let HeapData::List(list) = data else {
                    u.drop_with_heap(heap);
                    return Err(ExcType::badcall());
                };
                match dispatch::resolve_index(index, list.len()) {
                    Some(index) => list.set(index, u, heap),
                    None => {
                        u.drop_with_heap(heap);
                        Err(ExcType::index_error(Kind::List))
                    }
                }
            }),
            Ok(Slot::Key(key)) => dict_insert(&mut self.heap, v.id(), &key, u),
            Err(err) => {
                u.drop_with_heap(&mut self.heap);
                Err(err)
            }
        };
        v.drop_with_heap(&mut self.heap);
        result
    }

    /// `SLICE+n`: bit 2 of `bits` means a high bound is on the stack, bit 1 a
    /// low bound; the sequence is beneath them.
    pub(super) fn slice_op(&mut self, bits: u8) -> RunResult<()> {
        let bounds = usize::from(bits & 1) + usize::from((bits >> 1) & 1);
        self.require_depth(1 + bounds)?;
        let hi = if bits & 2 == 0 { None } else { Some(self.pop()?) };
        let lo = if bits & 1 == 0 { None } else { Some(self.pop()?) };
        let seq = self.pop()?;

        let result = slice_bounds(&self.heap, lo.as_ref(), hi.as_ref())
            .and_then(|(lo, hi)| dispatch::slice(&mut self.heap, &seq, lo, hi));

        [Some(seq), lo, hi].into_iter().for_each(|v| v.drop_with_heap(&mut self.heap));
        self.push(result?);
        Ok(())
    }

    /// `UNPACK_TUPLE n` / `UNPACK_LIST n`: pushes the items last-to-first, so
    /// the first item ends up on top.
    pub(super) fn unpack(&mut self, kind: Kind, n: usize) -> RunResult<()> {
        let seq = self.pop()?;
        let items = match self.heap.get(seq.id()) {
            HeapData::Tuple(t) if kind == Kind::Tuple => Ok(t.items()),
            HeapData::List(l) if kind == Kind::List => Ok(l.items()),
            _ => Err(ExcType::type_error(format!("unpack non-{kind}"))),
        };
        let items = match items {
            Ok(items) if items.len() == n => Ok(items
                .iter()
                .rev()
                .map(|item| item.clone_with_heap(&self.heap))
                .collect::<Vec<_>>()),
            Ok(_) => Err(ExcType::runtime_error(format!("unpack {kind} of wrong size"))),
            Err(err) => Err(err),
        };
        seq.drop_with_heap(&mut self.heap);
        self.stack.extend(items?);
        Ok(())
    }
}

fn slice_bounds(
    heap: &Heap<impl ResourceTracker>,
    lo: Option<&Value>,
    hi: Option<&Value>,
) -> RunResult<(Option<i64>, Option<i64>)> {
    let bound = |value: Option<&Value>| match value.map(|v| heap.get(v.id())) {
        None => Ok(None),
        Some(HeapData::Int(i)) => Ok(Some(*i)),
        Some(_) => Err(ExcType::type_error("slice index must be int")),
    };
    Ok((bound(lo)?, bound(hi)?))
}

fn subscript_value<T: ResourceTracker>(heap: &mut Heap<T>, v: &Value, w: &Value) -> RunResult<Value> {
    let heap_ref = &*heap;
    let index = match (heap_ref.get(v.id()), heap_ref.get(w.id())) {
        (HeapData::Dict(dict), HeapData::Str(key)) => {
            return dict
                .lookup(key.as_bytes())
                .map(|value| value.clone_with_heap(heap_ref))
                .ok_or_else(|| ExcType::runtime_error("key not in dictionary"));
        }
        (HeapData::Dict(_), key) => {
            return Err(ExcType::type_error(format!(
                "dictionary key must be string, not {}",
                key.py_kind()
            )));
        }
        (seq, HeapData::Int(i)) if seq.is_sequence() => *i,
        (seq, _) if seq.is_sequence() => {
            return Err(ExcType::type_error(format!("{} index must be int", seq.py_kind())));
        }
        (other, _) => return Err(ExcType::type_error_unsupported("subscript", other.py_kind())),
    };
    dispatch::index(heap, v, index)
}
