//! The `math` module: float functions over int or float arguments.

use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::{
    builtins::NativeFunction,
    exception_private::{ExcType, RunResult},
    heap::{DropWithHeap, Heap, HeapData},
    resource::ResourceTracker,
    types::{Dict, Method, Module, Str, dict_insert},
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum MathFunction {
    Acos,
    Asin,
    Atan,
    Ceil,
    Cos,
    Cosh,
    Exp,
    Fabs,
    Floor,
    Log,
    Log10,
    Sin,
    Sinh,
    Sqrt,
    Tan,
    Tanh,
    /// Takes `(y, x)`.
    Atan2,
    /// Takes `(x, y)`.
    Fmod,
    /// Takes `(x, y)`.
    Pow,
}

impl MathFunction {
    fn apply(self, x: f64, y: f64) -> f64 {
        match self {
            Self::Acos => x.acos(),
            Self::Asin => x.asin(),
            Self::Atan => x.atan(),
            Self::Ceil => x.ceil(),
            Self::Cos => x.cos(),
            Self::Cosh => x.cosh(),
            Self::Exp => x.exp(),
            Self::Fabs => x.abs(),
            Self::Floor => x.floor(),
            Self::Log => x.ln(),
            Self::Log10 => x.log10(),
            Self::Sin => x.sin(),
            Self::Sinh => x.sinh(),
            Self::Sqrt => x.sqrt(),
            Self::Tan => x.tan(),
            Self::Tanh => x.tanh(),
            Self::Atan2 => x.atan2(y),
            Self::Fmod => x % y,
            Self::Pow => x.powf(y),
        }
    }

    fn takes_pair(self) -> bool {
        matches!(self, Self::Atan2 | Self::Fmod | Self::Pow)
    }
}

/// Calls a math function, consuming `arg`.
///
/// A NaN result from non-NaN inputs is a domain error and an infinite result
/// from finite inputs a range error.
pub(crate) fn call<T: ResourceTracker>(heap: &mut Heap<T>, function: MathFunction, arg: Option<Value>) -> RunResult<Value> {
    let operands = arg.as_ref().and_then(|arg| read_operands(heap, function, arg));
    arg.drop_with_heap(heap);
    let Some((x, y)) = operands else {
        return Err(ExcType::badarg());
    };

    let result = function.apply(x, y);
    if result.is_nan() && !x.is_nan() && !y.is_nan() {
        return Err(ExcType::runtime_error("math domain error"));
    }
    if result.is_infinite() && x.is_finite() && y.is_finite() {
        return Err(ExcType::runtime_error("math range error"));
    }
    Ok(heap.allocate_value(HeapData::Float(result))?)
}

fn read_operands(heap: &Heap<impl ResourceTracker>, function: MathFunction, arg: &Value) -> Option<(f64, f64)> {
    if !function.takes_pair() {
        return Some((as_float(heap, arg)?, 0.0));
    }
    match heap.get(arg.id()) {
        HeapData::Tuple(t) => match t.items() {
            [x, y] => Some((as_float(heap, x)?, as_float(heap, y)?)),
            _ => None,
        },
        _ => None,
    }
}

fn as_float(heap: &Heap<impl ResourceTracker>, value: &Value) -> Option<f64> {
    match heap.get(value.id()) {
        HeapData::Float(f) => Some(*f),
        HeapData::Int(i) => Some(*i as f64),
        _ => None,
    }
}

/// Builds the `math` module object.
pub(crate) fn create_module<T: ResourceTracker>(heap: &mut Heap<T>) -> RunResult<Value> {
    let attrs = heap.allocate_value(HeapData::Dict(Dict::new()))?;
    for function in MathFunction::iter() {
        let method = match heap.allocate_value(HeapData::Method(Method::new(NativeFunction::Math(function)))) {
            Ok(method) => method,
            Err(err) => {
                attrs.drop_with_heap(heap);
                return Err(err.into());
            }
        };
        let name: &'static str = function.into();
        if let Err(err) = dict_insert(heap, attrs.id(), name.as_bytes(), method) {
            attrs.drop_with_heap(heap);
            return Err(err);
        }
    }
    let name = match heap.allocate_value(HeapData::Str(Str::from("math"))) {
        Ok(name) => name,
        Err(err) => {
            attrs.drop_with_heap(heap);
            return Err(err.into());
        }
    };
    Ok(heap.allocate_value(HeapData::Module(Module::new(name, attrs)))?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn pair_functions() {
        assert!(MathFunction::Pow.takes_pair());
        assert!(!MathFunction::Sqrt.takes_pair());
        assert_eq!(MathFunction::Pow.apply(2.0, 10.0), 1024.0);
        assert_eq!(MathFunction::Fmod.apply(7.5, 2.0), 1.5);
    }

    #[test]
    fn function_names_are_lowercase() {
        let names: Vec<&'static str> = MathFunction::iter().map(Into::into).collect();
        assert_eq!(names.len(), 19);
        assert!(names.contains(&"log10"));
        assert!(names.contains(&"atan2"));
    }
}
