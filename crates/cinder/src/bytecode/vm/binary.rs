//! Arithmetic opcodes.
//!
//! Numbers never mix: int with int and float with float only. `+` on two
//! sequences of the same kind is concatenation.

use strum::Display;

use super::Interpreter;
use crate::{
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapData},
    resource::ResourceTracker,
    tracer::VmTracer,
    types::{PyTrait, dispatch},
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub(super) enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
}

impl<T: ResourceTracker, Tr: VmTracer> Interpreter<T, Tr> {
    /// Pops `w` then `v` and pushes `v op w`.
    pub(super) fn binary_op(&mut self, op: BinaryOp) -> RunResult<()> {
        let (v, w) = self.pop2()?;
        let result = binary_value(&mut self.heap, op, &v, &w);
        v.drop_with_heap(&mut self.heap);
        w.drop_with_heap(&mut self.heap);
        self.push(result?);
        Ok(())
    }
}

fn binary_value<T: ResourceTracker>(heap: &mut Heap<T>, op: BinaryOp, v: &Value, w: &Value) -> RunResult<Value> {
    let data = match (heap.get(v.id()), heap.get(w.id())) {
        (HeapData::Int(a), HeapData::Int(b)) => Some(HeapData::Int(int_op(op, *a, *b)?)),
        (HeapData::Float(a), HeapData::Float(b)) => Some(HeapData::Float(float_op(op, *a, *b))),
        (a, b) if op != BinaryOp::Add => {
            return Err(ExcType::type_error(format!(
                "bad operand kinds for {op}: {} and {}",
                a.py_kind(),
                b.py_kind()
            )));
        }
        _ => None,
    };
    match data {
        Some(data) => Ok(heap.allocate_value(data)?),
        None => dispatch::concat(heap, v, w),
    }
}

/// Integer arithmetic wraps on overflow.
fn int_op(op: BinaryOp, a: i64, b: i64) -> RunResult<i64> {
    Ok(match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div | BinaryOp::Mod if b == 0 => {
            return Err(ExcType::runtime_error("integer division by zero"));
        }
        BinaryOp::Div => a.wrapping_div(b),
        BinaryOp::Mod => a.wrapping_rem(b),
    })
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
    }
}

/// `-v` for numbers.
pub(super) fn negate<T: ResourceTracker>(heap: &mut Heap<T>, v: &Value) -> RunResult<Value> {
    let data = match heap.get(v.id()) {
        HeapData::Int(i) => HeapData::Int(i.wrapping_neg()),
        HeapData::Float(f) => HeapData::Float(-f),
        other => return Err(ExcType::type_error_unsupported("unary -", other.py_kind())),
    };
    Ok(heap.allocate_value(data)?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn integer_division_truncates_toward_zero() {
        assert_eq!(int_op(BinaryOp::Div, -7, 2).unwrap(), -3);
        assert_eq!(int_op(BinaryOp::Mod, -7, 2).unwrap(), -1);
    }

    #[test]
    fn integer_overflow_wraps() {
        assert_eq!(int_op(BinaryOp::Add, i64::MAX, 1).unwrap(), i64::MIN);
        assert_eq!(int_op(BinaryOp::Div, i64::MIN, -1).unwrap(), i64::MIN);
    }

    #[test]
    fn zero_divisor_is_an_error() {
        assert!(int_op(BinaryOp::Mod, 1, 0).is_err());
        assert!(float_op(BinaryOp::Div, 1.0, 0.0).is_infinite());
    }

    #[test]
    fn operator_symbols() {
        assert_eq!(BinaryOp::Mod.to_string(), "%");
    }
}
