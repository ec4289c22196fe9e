use crate::{
    heap::HeapId,
    types::{Kind, PyTrait},
    value::Value,
};

/// One link of a traceback chain: a frame and the line it was executing when an
/// error unwound through it.
///
/// New entries are prepended as the error propagates outwards, so the head of a
/// chain is the outermost frame.
#[derive(Debug)]
pub(crate) struct Traceback {
    next: Option<Value>,
    frame: Value,
    lineno: u32,
}

impl Traceback {
    pub fn new(next: Option<Value>, frame: Value, lineno: u32) -> Self {
        Self { next, frame, lineno }
    }

    pub fn next(&self) -> Option<&Value> {
        self.next.as_ref()
    }

    pub fn frame(&self) -> &Value {
        &self.frame
    }

    pub fn lineno(&self) -> u32 {
        self.lineno
    }
}

impl PyTrait for Traceback {
    fn py_kind(&self) -> Kind {
        Kind::Traceback
    }

    fn py_estimate_size(&self) -> usize {
        0
    }

    fn py_dec_ref_ids(&mut self, stack: &mut Vec<HeapId>) {
        if let Some(next) = &mut self.next {
            next.push_child_id(stack);
        }
        self.frame.push_child_id(stack);
    }
}
