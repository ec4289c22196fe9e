//! Native functions: the builtins dict and the functions behind `Method` objects.
//!
//! # Module Structure
//!
//! - `convert` - `float()`, `int()` and `notv()`
//! - `len` - `len()`
//! - `range` - `range()`
//! - `sequence` - `append()` and `insert()`
//!
//! Every native receives at most one argument, owned. Several arguments arrive
//! packed in a tuple. The native releases its argument before returning.

mod convert;
mod len;
mod range;
mod sequence;

use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{
    exception_private::RunResult,
    heap::{DropWithHeap, Heap, HeapData, HeapId},
    modules::math::{self, MathFunction},
    resource::ResourceTracker,
    types::{Method, dict_insert},
    value::Value,
};

/// Functions bound in the builtins dict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum BuiltinFunction {
    Float,
    Int,
    Len,
    Range,
    Append,
    Insert,
    Pass,
    Notv,
}

/// Any function implemented in Rust: a builtin or a function of a built-in module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NativeFunction {
    Builtin(BuiltinFunction),
    Math(MathFunction),
}

impl NativeFunction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Builtin(f) => f.into(),
            Self::Math(f) => f.into(),
        }
    }
}

/// Calls a native function, consuming `arg`.
pub(crate) fn call_native<T: ResourceTracker>(
    heap: &mut Heap<T>,
    function: NativeFunction,
    arg: Option<Value>,
) -> RunResult<Value> {
    match function {
        NativeFunction::Builtin(builtin) => match builtin {
            BuiltinFunction::Float => convert::float(heap, arg),
            BuiltinFunction::Int => convert::int(heap, arg),
            BuiltinFunction::Notv => convert::notv(heap, arg),
            BuiltinFunction::Len => len::len(heap, arg),
            BuiltinFunction::Range => range::range(heap, arg),
            BuiltinFunction::Append => sequence::append(heap, arg),
            BuiltinFunction::Insert => sequence::insert(heap, arg),
            BuiltinFunction::Pass => {
                arg.drop_with_heap(heap);
                Ok(heap.none())
            }
        },
        NativeFunction::Math(f) => math::call(heap, f, arg),
    }
}

/// Fills the builtins dict: one `Method` per builtin plus `true`, `false` and `none`.
pub(crate) fn install<T: ResourceTracker>(heap: &mut Heap<T>, builtins: HeapId) -> RunResult<()> {
    for builtin in BuiltinFunction::iter() {
        let method = heap.allocate_value(HeapData::Method(Method::new(NativeFunction::Builtin(builtin))))?;
        let name: &'static str = builtin.into();
        dict_insert(heap, builtins, name.as_bytes(), method)?;
    }
    let constants = [
        ("true", heap.bool_value(true)),
        ("false", heap.bool_value(false)),
        ("none", heap.none()),
    ];
    for (name, value) in constants {
        dict_insert(heap, builtins, name.as_bytes(), value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn builtin_names_are_lowercase() {
        assert_eq!(NativeFunction::Builtin(BuiltinFunction::Notv).name(), "notv");
        assert_eq!(NativeFunction::Math(MathFunction::Log10).name(), "log10");
        assert_eq!("range".parse::<BuiltinFunction>().unwrap(), BuiltinFunction::Range);
    }
}
