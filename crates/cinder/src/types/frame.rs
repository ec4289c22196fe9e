use smallvec::SmallVec;
use strum::Display;

use crate::{
    heap::HeapId,
    types::{Kind, PyTrait},
    value::Value,
};

/// Maximum number of blocks a frame may hold at once.
pub(crate) const MAX_BLOCKS: usize = 20;

/// What pushed a block: a loop setup or an exception-handler setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, serde::Serialize, serde::Deserialize)]
pub enum BlockKind {
    #[strum(serialize = "loop")]
    Loop,
    #[strum(serialize = "except")]
    Except,
}

/// One block stack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block {
    pub kind: BlockKind,
    /// Bytecode offset to resume at when the block handles a break.
    pub handler: usize,
    /// Value stack depth, relative to the frame, to restore on unwind.
    pub level: usize,
}

/// A frame's block stack, bounded by [`MAX_BLOCKS`].
pub(crate) type BlockStack = SmallVec<[Block; 4]>;

/// The heap-visible part of an activation record.
///
/// Holds the links a traceback needs: the caller's frame, the executing code,
/// the globals and locals dicts and the last line recorded by `SET_LINENO`.
/// The value stack and block stack of a running frame live in the interpreter,
/// segmented per call.
#[derive(Debug)]
pub(crate) struct Frame {
    back: Option<Value>,
    code: Value,
    globals: Value,
    locals: Value,
}

impl Frame {
    pub fn new(back: Option<Value>, code: Value, globals: Value, locals: Value) -> Self {
        Self {
            back,
            code,
            globals,
            locals,
        }
    }

    pub fn code(&self) -> &Value {
        &self.code
    }
}

impl PyTrait for Frame {
    fn py_kind(&self) -> Kind {
        Kind::Frame
    }

    fn py_estimate_size(&self) -> usize {
        0
    }

    fn py_dec_ref_ids(&mut self, stack: &mut Vec<HeapId>) {
        if let Some(back) = &mut self.back {
            back.push_child_id(stack);
        }
        self.code.push_child_id(stack);
        self.globals.push_child_id(stack);
        self.locals.push_child_id(stack);
    }
}
