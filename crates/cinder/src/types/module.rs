//! Module objects: a name and an attribute dict.

use crate::{
    heap::HeapId,
    types::{Kind, PyTrait},
    value::Value,
};

/// A module with a name and attribute dictionary.
///
/// Both fields are handles to heap objects: the name is a string and the
/// attributes are a dict, so `__dict__` and `__name__` can hand them out directly.
#[derive(Debug)]
pub(crate) struct Module {
    name: Value,
    attrs: Value,
}

impl Module {
    /// Takes ownership of both handles.
    pub fn new(name: Value, attrs: Value) -> Self {
        Self { name, attrs }
    }

    /// Borrowed handle to the module's name string.
    pub fn name(&self) -> &Value {
        &self.name
    }

    /// Borrowed handle to the module's attribute dict.
    pub fn attrs(&self) -> &Value {
        &self.attrs
    }
}

impl PyTrait for Module {
    fn py_kind(&self) -> Kind {
        Kind::Module
    }

    fn py_estimate_size(&self) -> usize {
        0
    }

    fn py_dec_ref_ids(&mut self, stack: &mut Vec<HeapId>) {
        self.name.push_child_id(stack);
        self.attrs.push_child_id(stack);
    }
}
