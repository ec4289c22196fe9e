//! The prototype-style class system: classes, their members (instances) and
//! methods bound to a member.
//!
//! There is no inheritance. Attribute lookup on a member checks the member's own
//! dict and then its class's dict; a function found in the class dict is bound to
//! the member as a [`ClassMethod`].

use crate::{
    heap::HeapId,
    types::{Kind, PyTrait},
    value::Value,
};

/// A class: just an attribute dict, built from the locals of the class body.
#[derive(Debug)]
pub(crate) struct Class {
    attrs: Value,
}

impl Class {
    pub fn new(attrs: Value) -> Self {
        Self { attrs }
    }

    pub fn attrs(&self) -> &Value {
        &self.attrs
    }
}

impl PyTrait for Class {
    fn py_kind(&self) -> Kind {
        Kind::Class
    }

    fn py_estimate_size(&self) -> usize {
        0
    }

    fn py_dec_ref_ids(&mut self, stack: &mut Vec<HeapId>) {
        self.attrs.push_child_id(stack);
    }
}

/// An instance of a class, with its own attribute dict.
#[derive(Debug)]
pub(crate) struct ClassMember {
    class: Value,
    attrs: Value,
}

impl ClassMember {
    pub fn new(class: Value, attrs: Value) -> Self {
        Self { class, attrs }
    }

    pub fn class(&self) -> &Value {
        &self.class
    }

    pub fn attrs(&self) -> &Value {
        &self.attrs
    }
}

impl PyTrait for ClassMember {
    fn py_kind(&self) -> Kind {
        Kind::ClassMember
    }

    fn py_estimate_size(&self) -> usize {
        0
    }

    fn py_dec_ref_ids(&mut self, stack: &mut Vec<HeapId>) {
        self.class.push_child_id(stack);
        self.attrs.push_child_id(stack);
    }
}

/// A function bound to a class member.
///
/// Calling it passes the member as the argument, or `(member, arg)` when an
/// argument is given.
#[derive(Debug)]
pub(crate) struct ClassMethod {
    func: Value,
    self_: Value,
}

impl ClassMethod {
    pub fn new(func: Value, self_: Value) -> Self {
        Self { func, self_ }
    }

    pub fn func(&self) -> &Value {
        &self.func
    }

    pub fn self_(&self) -> &Value {
        &self.self_
    }
}

impl PyTrait for ClassMethod {
    fn py_kind(&self) -> Kind {
        Kind::ClassMethod
    }

    fn py_estimate_size(&self) -> usize {
        0
    }

    fn py_dec_ref_ids(&mut self, stack: &mut Vec<HeapId>) {
        self.func.push_child_id(stack);
        self.self_.push_child_id(stack);
    }
}
