use std::rc::Rc;

use crate::{
    heap::HeapId,
    types::{Kind, PyTrait},
    value::Value,
};

/// Compiled code: bytecode, constants, names and the source filename.
///
/// Immutable after construction. The bytecode, names and filename are shared
/// with `Rc` so the eval loop can hold them while it mutates the heap.
#[derive(Debug)]
pub(crate) struct Code {
    bytecode: Rc<[u8]>,
    consts: Vec<Value>,
    names: Rc<[Rc<str>]>,
    filename: Rc<str>,
}

impl Code {
    pub fn new(bytecode: Rc<[u8]>, consts: Vec<Value>, names: Rc<[Rc<str>]>, filename: Rc<str>) -> Self {
        Self {
            bytecode,
            consts,
            names,
            filename,
        }
    }

    pub fn bytecode(&self) -> &Rc<[u8]> {
        &self.bytecode
    }

    /// Borrowed handle to constant `index`.
    pub fn constant(&self, index: usize) -> Option<&Value> {
        self.consts.get(index)
    }

    pub fn names(&self) -> &Rc<[Rc<str>]> {
        &self.names
    }

    pub fn filename(&self) -> &Rc<str> {
        &self.filename
    }
}

impl PyTrait for Code {
    fn py_kind(&self) -> Kind {
        Kind::Code
    }

    fn py_estimate_size(&self) -> usize {
        self.bytecode.len() + self.consts.len() * std::mem::size_of::<Value>()
    }

    fn py_dec_ref_ids(&mut self, stack: &mut Vec<HeapId>) {
        for value in &mut self.consts {
            value.push_child_id(stack);
        }
    }
}
