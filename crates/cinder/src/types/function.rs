use crate::{
    builtins::NativeFunction,
    heap::HeapId,
    types::{Kind, PyTrait},
    value::Value,
};

/// A user function: a code object plus the module globals it was defined in.
///
/// Functions do not close over enclosing function locals.
#[derive(Debug)]
pub(crate) struct Func {
    code: Value,
    globals: Value,
}

impl Func {
    pub fn new(code: Value, globals: Value) -> Self {
        Self { code, globals }
    }

    pub fn code(&self) -> &Value {
        &self.code
    }

    pub fn globals(&self) -> &Value {
        &self.globals
    }
}

impl PyTrait for Func {
    fn py_kind(&self) -> Kind {
        Kind::Func
    }

    fn py_estimate_size(&self) -> usize {
        0
    }

    fn py_dec_ref_ids(&mut self, stack: &mut Vec<HeapId>) {
        self.code.push_child_id(stack);
        self.globals.push_child_id(stack);
    }
}

/// A built-in callable wrapping a native function.
#[derive(Debug)]
pub(crate) struct Method {
    function: NativeFunction,
}

impl Method {
    pub fn new(function: NativeFunction) -> Self {
        Self { function }
    }

    pub fn function(&self) -> NativeFunction {
        self.function
    }
}

impl PyTrait for Method {
    fn py_kind(&self) -> Kind {
        Kind::Method
    }

    fn py_estimate_size(&self) -> usize {
        0
    }

    fn py_dec_ref_ids(&mut self, _stack: &mut Vec<HeapId>) {}
}
