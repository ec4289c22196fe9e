//! The interpreter: eval loop, unwind state machine and call convention.
//!
//! Execution is a stack machine. One value stack is shared by every active frame,
//! segmented by each frame's `stack_base`; each frame keeps its own block stack.
//! A call runs in a nested Rust call (`eval_code` -> `run_frame` -> `step` ->
//! `call_value` -> `eval_code`), so the host stack mirrors the frame chain.
//!
//! Errors travel as [`RunError`] through the opcode handlers and are written to
//! the interpreter's error slot in one place, `run_frame`, which then drives the
//! unwind.

mod attr;
mod binary;
mod call;
mod collections;
mod compare;
mod exceptions;

use std::{cmp::Ordering, rc::Rc};

use binary::BinaryOp;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoEnumIterator, IntoStaticStr};

use crate::{
    builtins,
    bytecode::{
        image::{CodeImage, Const},
        op::{CompareOp, Opcode},
    },
    exception_private::{ExcType, RunError, RunResult, SimpleException},
    exception_public::Exception,
    heap::{DropWithHeap, Heap, HeapData, HeapId, HeapStats},
    object::{InvalidInputError, Object},
    resource::{NoLimitTracker, ResourceTracker},
    tracer::{NoopTracer, VmTracer},
    types::{
        Block, BlockKind, BlockStack, Class, Code, Dict, Frame, Func, Kind, List, MAX_BLOCKS, Module, PyTrait, Str,
        Tuple, dict_insert, dict_lookup, dict_remove, dispatch,
    },
    value::Value,
};

/// Why the eval loop left its normal instruction-by-instruction path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UnwindReason {
    /// An error was raised; the error slot holds it.
    Exception,
    /// `RETURN_VALUE` is leaving the frame with a result.
    Return,
    /// `BREAK_LOOP` is looking for the innermost loop block.
    Break,
}

/// Outcome of one instruction.
enum Flow {
    Next,
    Return(Value),
    Break,
}

/// Interpreter-side state of one active frame.
///
/// The heap [`Frame`] object holds the references that keep the code, globals
/// and locals alive; the ids here are borrowed from it.
#[derive(Debug)]
struct CallFrame {
    frame: Value,
    code: HeapId,
    globals: HeapId,
    locals: HeapId,
    bytecode: Rc<[u8]>,
    names: Rc<[Rc<str>]>,
    filename: Rc<str>,
    /// Offset of the next instruction.
    ip: usize,
    /// Last line recorded by `SET_LINENO`.
    lineno: u32,
    /// Index of this frame's first slot on the shared value stack.
    stack_base: usize,
    blocks: BlockStack,
}

/// A runtime instance: the heap, the builtins and module tables, the error slot
/// and the stacks of whatever is executing.
///
/// Every object handed out is a [`Value`], an owning reference. Give it back
/// with [`Interpreter::release`] once done with it.
///
/// # Example
///
/// ```
/// use cinder::{CodeBuilder, Interpreter, Object, Opcode};
///
/// let mut builder = CodeBuilder::new("main.py");
/// builder.load_const(1).load_const(2).emit(Opcode::BinaryAdd).emit(Opcode::ReturnValue);
///
/// let mut interp = Interpreter::new();
/// let code = interp.load_code(&builder.build()).unwrap();
/// let globals = interp.new_dict().unwrap();
/// let result = interp.eval(&code, &globals, &globals, None).unwrap();
/// assert_eq!(interp.to_object(&result), Object::Int(3));
/// for value in [result, code, globals] {
///     interp.release(value);
/// }
/// ```
#[derive(Debug)]
pub struct Interpreter<T: ResourceTracker = NoLimitTracker, Tr: VmTracer = NoopTracer> {
    heap: Heap<T>,
    tracer: Tr,
    /// Value stack shared by all frames.
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    /// Current error: (exception, associated value).
    error: Option<(Value, Value)>,
    /// Head of the current traceback chain, the outermost frame reached so far.
    traceback: Option<Value>,
    builtins: Value,
    /// Imported and registered modules by name.
    modules: Value,
    /// The error singletons, one per [`ExcType`].
    exceptions: Vec<(ExcType, Value)>,
}

impl Interpreter {
    /// An interpreter with no resource limits and no tracing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tracker(NoLimitTracker, NoopTracer)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocates the builtins dict, the module table and the error singletons.
///
/// Runs untracked: the tracker only sees what the program itself allocates.
fn bring_up<T: ResourceTracker>(heap: &mut Heap<T>) -> RunResult<(Value, Value, Vec<(ExcType, Value)>)> {
    let builtins = heap.allocate_value(HeapData::Dict(Dict::new()))?;
    let modules = heap.allocate_value(HeapData::Dict(Dict::new()))?;
    builtins::install(heap, builtins.id())?;

    let mut exceptions = Vec::new();
    for exc_type in ExcType::iter() {
        let exc = heap.allocate_value(HeapData::Str(Str::from(exc_type.singleton_text())))?;
        let name: &'static str = exc_type.into();
        let binding = exc.clone_with_heap(heap);
        dict_insert(heap, builtins.id(), name.as_bytes(), binding)?;
        exceptions.push((exc_type, exc));
    }
    Ok((builtins, modules, exceptions))
}

impl<T: ResourceTracker, Tr: VmTracer> Interpreter<T, Tr> {
    /// Creates an interpreter that charges allocations and instructions to
    /// `tracker` and reports execution events to `tracer`.
    ///
    /// # Panics
    /// Panics if the builtins cannot be allocated. Bring-up is not charged to
    /// the tracker, so this only happens when the host itself is out of memory.
    pub fn with_tracker(tracker: T, tracer: Tr) -> Self {
        let mut heap = Heap::new(64, tracker);
        heap.set_tracking(false);
        let (builtins, modules, exceptions) = bring_up(&mut heap).expect("interpreter bring-up failed");
        heap.set_tracking(true);
        Self {
            heap,
            tracer,
            stack: Vec::new(),
            frames: Vec::new(),
            error: None,
            traceback: None,
            builtins,
            modules,
            exceptions,
        }
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Executes `code` against `globals` and `locals`, with `arg` pushed as the
    /// frame's initial argument.
    ///
    /// Returns the frame's result, or None when an error escaped it. The error
    /// is then in the error slot and the traceback holds one entry per frame it
    /// unwound through.
    ///
    /// A top-level call starts with an empty error slot and traceback.
    pub fn eval(&mut self, code: &Value, globals: &Value, locals: &Value, arg: Option<Value>) -> Option<Value> {
        if self.frames.is_empty() {
            self.clear_error();
        }
        match self.eval_code(code, globals, locals, arg) {
            Ok(value) => Some(value),
            Err(err) => {
                self.record_error(err);
                None
            }
        }
    }

    /// Calls `callable` the way `UNARY_CALL` / `BINARY_CALL` do, with the same
    /// error convention as [`Self::eval`].
    pub fn call(&mut self, callable: &Value, arg: Option<Value>) -> Option<Value> {
        if self.frames.is_empty() {
            self.clear_error();
        }
        match self.call_value(callable, arg) {
            Ok(value) => Some(value),
            Err(err) => {
                self.record_error(err);
                None
            }
        }
    }

    /// Pushes a frame, runs it to completion and retires it.
    ///
    /// Takes ownership of `arg`, which is released if the frame cannot be built.
    fn eval_code(&mut self, code: &Value, globals: &Value, locals: &Value, arg: Option<Value>) -> RunResult<Value> {
        if let Err(err) = self.enter_frame(code, globals, locals) {
            arg.drop_with_heap(&mut self.heap);
            return Err(err);
        }
        if let Some(arg) = arg {
            self.push(arg);
        }
        let result = self.run_frame();
        self.leave_frame();
        result
    }

    fn enter_frame(&mut self, code: &Value, globals: &Value, locals: &Value) -> RunResult<()> {
        self.heap.tracker().check_recursion_depth(self.frames.len())?;
        let HeapData::Code(code_data) = self.heap.get(code.id()) else {
            return Err(ExcType::badcall());
        };
        let bytecode = Rc::clone(code_data.bytecode());
        let names = Rc::clone(code_data.names());
        let filename = Rc::clone(code_data.filename());
        for dict in [globals, locals] {
            if !matches!(self.heap.get(dict.id()), HeapData::Dict(_)) {
                return Err(ExcType::badcall());
            }
        }

        let back = self.frames.last().map(|caller| caller.frame.clone_with_heap(&self.heap));
        let frame = Frame::new(
            back,
            code.clone_with_heap(&self.heap),
            globals.clone_with_heap(&self.heap),
            locals.clone_with_heap(&self.heap),
        );
        let frame = self.heap.allocate_value(HeapData::Frame(frame))?;

        self.frames.push(CallFrame {
            frame,
            code: code.id(),
            globals: globals.id(),
            locals: locals.id(),
            bytecode,
            names,
            filename: Rc::clone(&filename),
            ip: 0,
            lineno: 0,
            stack_base: self.stack.len(),
            blocks: BlockStack::new(),
        });
        self.tracer.on_call(&filename, self.frames.len());
        Ok(())
    }

    /// Drains the frame's value stack, unlinks it and releases the frame object.
    fn leave_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let leftovers = self.stack.split_off(frame.stack_base);
        leftovers.drop_with_heap(&mut self.heap);
        frame.frame.drop_with_heap(&mut self.heap);
        self.tracer.on_return(self.frames.len());
    }

    /// Runs the current frame until it returns or an unwind escapes it.
    fn run_frame(&mut self) -> RunResult<Value> {
        loop {
            let (mut reason, mut retval) = match self.step() {
                Ok(Flow::Next) => continue,
                Ok(Flow::Return(value)) => (UnwindReason::Return, Some(value)),
                Ok(Flow::Break) => (UnwindReason::Break, None),
                Err(err) => {
                    self.record_error(err);
                    (UnwindReason::Exception, None)
                }
            };

            // the error slot must agree with the unwind reason
            if reason == UnwindReason::Exception {
                debug_assert!(self.error.is_some(), "exception unwind with no error set");
                if self.error.is_none() {
                    self.set_error_string(ExcType::SystemError, "ghost error");
                }
            } else {
                debug_assert!(self.error.is_none(), "error set during a {reason} unwind");
                if self.error.is_some() {
                    retval.take().drop_with_heap(&mut self.heap);
                    reason = UnwindReason::Exception;
                }
            }

            self.tracer.on_unwind(reason, self.frames.len());
            if reason == UnwindReason::Exception {
                self.push_traceback_entry();
            }
            if self.unwind_blocks(reason) {
                continue;
            }

            return match (reason, retval) {
                (UnwindReason::Return, Some(value)) => Ok(value),
                (UnwindReason::Break, _) => {
                    self.set_error_string(ExcType::SystemError, "break outside loop");
                    self.push_traceback_entry();
                    Err(RunError::Propagated)
                }
                (_, retval) => {
                    retval.drop_with_heap(&mut self.heap);
                    Err(RunError::Propagated)
                }
            };
        }
    }

    /// Pops blocks, draining the value stack to each block's level.
    ///
    /// Returns true when a loop block consumed a break; execution then resumes
    /// at the block's handler.
    fn unwind_blocks(&mut self, reason: UnwindReason) -> bool {
        while let Some(block) = self.frame_mut().blocks.pop() {
            let depth = self.frame().blocks.len();
            self.tracer.on_block_pop(depth);
            let floor = self.frame().stack_base + block.level;
            self.drain_stack(floor);
            if block.kind == BlockKind::Loop && reason == UnwindReason::Break {
                self.jump_to(block.handler);
                return true;
            }
        }
        false
    }

    /// Fetches, decodes and executes one instruction.
    fn step(&mut self) -> RunResult<Flow> {
        self.heap.tracker_mut().check_time()?;

        let frame = self.frame();
        let offset = frame.ip;
        let Some(&byte) = frame.bytecode.get(offset) else {
            return Err(ExcType::system_error("bytecode ran off the end"));
        };
        let Some(op) = Opcode::from_repr(byte) else {
            return Err(ExcType::system_error("unknown opcode"));
        };
        let (oparg, next) = if op.has_argument() {
            match frame.bytecode.get(offset + 1..offset + 3) {
                Some(&[lo, hi]) => (u16::from_le_bytes([lo, hi]), offset + 3),
                _ => return Err(ExcType::system_error("bytecode ran off the end")),
            }
        } else {
            (0, offset + 1)
        };
        self.jump_to(next);
        self.tracer
            .on_instruction(offset, op, self.stack_depth(), self.frames.len());
        let arg = usize::from(oparg);

        match op {
            Opcode::PopTop | Opcode::PrintExpr => {
                let v = self.pop()?;
                v.drop_with_heap(&mut self.heap);
            }
            Opcode::RotTwo => {
                self.require_depth(2)?;
                let len = self.stack.len();
                self.stack.swap(len - 1, len - 2);
            }
            Opcode::RotThree => {
                self.require_depth(3)?;
                let len = self.stack.len();
                self.stack[len - 3..].rotate_right(1);
            }
            Opcode::DupTop => {
                let top = self.peek()?.clone_with_heap(&self.heap);
                self.push(top);
            }
            Opcode::UnaryNegative => {
                let v = self.pop()?;
                let result = binary::negate(&mut self.heap, &v);
                v.drop_with_heap(&mut self.heap);
                self.push(result?);
            }
            Opcode::UnaryNot => {
                let v = self.pop()?;
                let truthy = self.heap.get(v.id()).is_truthy();
                v.drop_with_heap(&mut self.heap);
                let result = self.heap.bool_value(!truthy);
                self.push(result);
            }
            Opcode::UnaryCall => {
                let callee = self.pop()?;
                let result = self.call_value(&callee, None);
                callee.drop_with_heap(&mut self.heap);
                self.push(result?);
            }
            Opcode::BinaryCall => {
                let (callee, arg) = self.pop2()?;
                let result = self.call_value(&callee, Some(arg));
                callee.drop_with_heap(&mut self.heap);
                self.push(result?);
            }
            Opcode::BinaryMultiply => self.binary_op(BinaryOp::Mul)?,
            Opcode::BinaryDivide => self.binary_op(BinaryOp::Div)?,
            Opcode::BinaryModulo => self.binary_op(BinaryOp::Mod)?,
            Opcode::BinaryAdd => self.binary_op(BinaryOp::Add)?,
            Opcode::BinarySubtract => self.binary_op(BinaryOp::Sub)?,
            Opcode::BinarySubscr => self.subscript()?,
            Opcode::Slice | Opcode::Slice1 | Opcode::Slice2 | Opcode::Slice3 => {
                self.slice_op(byte - Opcode::Slice as u8)?;
            }
            Opcode::StoreSubscr => self.store_subscript()?,
            Opcode::BreakLoop => return Ok(Flow::Break),
            Opcode::LoadLocals => {
                let locals = self.new_ref(self.frame().locals);
                self.push(locals);
            }
            Opcode::ReturnValue => return Ok(Flow::Return(self.pop()?)),
            Opcode::RequireArgs => {
                if self.stack_depth() == 0 {
                    return Err(ExcType::type_error("function expects argument(s)"));
                }
            }
            Opcode::RefuseArgs => {
                if self.stack_depth() > 0 {
                    return Err(ExcType::type_error("function expects no argument(s)"));
                }
            }
            Opcode::BuildFunction => {
                let code = self.pop()?;
                if !matches!(self.heap.get(code.id()), HeapData::Code(_)) {
                    code.drop_with_heap(&mut self.heap);
                    return Err(ExcType::badcall());
                }
                let globals = self.new_ref(self.frame().globals);
                let func = self.heap.allocate_value(HeapData::Func(Func::new(code, globals)))?;
                self.push(func);
            }
            Opcode::PopBlock => {
                let Some(block) = self.frame_mut().blocks.pop() else {
                    return Err(ExcType::runtime_error("stack underflow"));
                };
                let depth = self.frame().blocks.len();
                self.tracer.on_block_pop(depth);
                let floor = self.frame().stack_base + block.level;
                self.drain_stack(floor);
            }
            Opcode::BuildClass => {
                let attrs = self.pop()?;
                if !matches!(self.heap.get(attrs.id()), HeapData::Dict(_)) {
                    attrs.drop_with_heap(&mut self.heap);
                    return Err(ExcType::badcall());
                }
                let class = self.heap.allocate_value(HeapData::Class(Class::new(attrs)))?;
                self.push(class);
            }
            Opcode::StoreName => {
                let name = self.name(arg)?;
                let v = self.pop()?;
                let locals = self.frame().locals;
                dict_insert(&mut self.heap, locals, name.as_bytes(), v)?;
            }
            Opcode::UnpackTuple => self.unpack(Kind::Tuple, arg)?,
            Opcode::UnpackList => self.unpack(Kind::List, arg)?,
            Opcode::StoreAttr => {
                let name = self.name(arg)?;
                let (value, obj) = self.pop2()?;
                let result = self.store_attr(&obj, &name, value);
                obj.drop_with_heap(&mut self.heap);
                result?;
            }
            Opcode::LoadConst => {
                let HeapData::Code(code) = self.heap.get(self.frame().code) else {
                    return Err(ExcType::badcall());
                };
                let Some(constant) = code.constant(arg) else {
                    return Err(ExcType::system_error("constant index out of range"));
                };
                let constant = constant.clone_with_heap(&self.heap);
                self.push(constant);
            }
            Opcode::LoadName => {
                let name = self.name(arg)?;
                let frame = self.frame();
                let found = [frame.locals, frame.globals, self.builtins.id()]
                    .into_iter()
                    .find_map(|dict| dict_lookup(&self.heap, dict, name.as_bytes()));
                let Some(found) = found else {
                    return Err(ExcType::name_error(&*name));
                };
                let value = found.clone_with_heap(&self.heap);
                self.push(value);
            }
            Opcode::BuildTuple => {
                let items = self.pop_n(arg)?;
                let tuple = self.heap.allocate_value(HeapData::Tuple(Tuple::from_vec(items)))?;
                self.push(tuple);
            }
            Opcode::BuildList => {
                let items = self.pop_n(arg)?;
                let list = self.heap.allocate_value(HeapData::List(List::from_vec(items)))?;
                self.push(list);
            }
            Opcode::BuildMap => {
                let dict = self.heap.allocate_value(HeapData::Dict(Dict::new()))?;
                self.push(dict);
            }
            Opcode::LoadAttr => {
                let name = self.name(arg)?;
                let obj = self.pop()?;
                let result = self.load_attr(&obj, &name);
                obj.drop_with_heap(&mut self.heap);
                self.push(result?);
            }
            Opcode::CompareOp => {
                let cmp = u8::try_from(arg)
                    .ok()
                    .and_then(CompareOp::from_repr)
                    .ok_or_else(|| ExcType::system_error("bad comparison operator"))?;
                self.compare_op(cmp)?;
            }
            Opcode::ImportName => {
                let name = self.name(arg)?;
                let module = self.import_module(&name)?;
                self.push(module);
            }
            Opcode::ImportFrom => {
                let name = self.name(arg)?;
                self.import_from(&name)?;
            }
            Opcode::JumpForward => self.jump_to(next + arg),
            Opcode::JumpIfFalse => {
                if !self.heap.get(self.peek()?.id()).is_truthy() {
                    self.jump_to(next + arg);
                }
            }
            Opcode::JumpIfTrue => {
                if self.heap.get(self.peek()?.id()).is_truthy() {
                    self.jump_to(next + arg);
                }
            }
            Opcode::JumpAbsolute => self.jump_to(arg),
            Opcode::ForLoop => self.for_loop(next + arg)?,
            Opcode::SetupLoop => self.setup_block(BlockKind::Loop, next + arg)?,
            Opcode::SetupExcept => self.setup_block(BlockKind::Except, next + arg)?,
            Opcode::SetLineno => self.frame_mut().lineno = u32::from(oparg),
        }
        Ok(Flow::Next)
    }

    /// `FOR_LOOP`: pops the sequence and the index. Pushes the sequence, the next
    /// index and the item, or jumps to `exhausted` once the index runs past the end.
    fn for_loop(&mut self, exhausted: usize) -> RunResult<()> {
        let (seq, index) = self.pop2()?;
        let position = match self.heap.get(index.id()) {
            HeapData::Int(i) => usize::try_from(*i).ok(),
            _ => None,
        };
        index.drop_with_heap(&mut self.heap);
        let Some(position) = position else {
            seq.drop_with_heap(&mut self.heap);
            return Err(ExcType::badcall());
        };

        match dispatch::loop_item(&mut self.heap, &seq, position) {
            Ok(Some(item)) => {
                let next_index = i64::try_from(position + 1).unwrap_or(i64::MAX);
                match self.heap.allocate_value(HeapData::Int(next_index)) {
                    Ok(next_index) => {
                        self.push(seq);
                        self.push(next_index);
                        self.push(item);
                        Ok(())
                    }
                    Err(err) => {
                        seq.drop_with_heap(&mut self.heap);
                        item.drop_with_heap(&mut self.heap);
                        Err(err.into())
                    }
                }
            }
            Ok(None) => {
                seq.drop_with_heap(&mut self.heap);
                self.jump_to(exhausted);
                Ok(())
            }
            Err(err) => {
                seq.drop_with_heap(&mut self.heap);
                Err(err)
            }
        }
    }

    fn setup_block(&mut self, kind: BlockKind, handler: usize) -> RunResult<()> {
        let level = self.stack_depth();
        let frame = self.frame_mut();
        if frame.blocks.len() >= MAX_BLOCKS {
            return Err(ExcType::runtime_error("stack overflow"));
        }
        frame.blocks.push(Block { kind, handler, level });
        let depth = frame.blocks.len();
        self.tracer.on_block_push(kind, depth);
        Ok(())
    }

    // ========================================================================
    // Stack and frame helpers
    // ========================================================================

    /// Number of values on the current frame's segment of the value stack.
    fn stack_depth(&self) -> usize {
        self.frames
            .last()
            .map_or(self.stack.len(), |frame| self.stack.len() - frame.stack_base)
    }

    fn require_depth(&self, n: usize) -> RunResult<()> {
        if self.stack_depth() < n {
            Err(ExcType::system_error("value stack underflow"))
        } else {
            Ok(())
        }
    }

    #[inline]
    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> RunResult<Value> {
        self.require_depth(1)?;
        Ok(self.stack.pop().expect("stack depth checked"))
    }

    /// Pops two values, returning them in stack order: `(second, top)`.
    fn pop2(&mut self) -> RunResult<(Value, Value)> {
        self.require_depth(2)?;
        let top = self.stack.pop().expect("stack depth checked");
        let second = self.stack.pop().expect("stack depth checked");
        Ok((second, top))
    }

    /// Pops three values, returning them in stack order: `(third, second, top)`.
    fn pop3(&mut self) -> RunResult<(Value, Value, Value)> {
        self.require_depth(3)?;
        let top = self.stack.pop().expect("stack depth checked");
        let second = self.stack.pop().expect("stack depth checked");
        let third = self.stack.pop().expect("stack depth checked");
        Ok((third, second, top))
    }

    /// Pops `n` values, returned bottom-most first.
    fn pop_n(&mut self, n: usize) -> RunResult<Vec<Value>> {
        self.require_depth(n)?;
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn peek(&self) -> RunResult<&Value> {
        self.require_depth(1)?;
        Ok(self.stack.last().expect("stack depth checked"))
    }

    /// Releases values until the shared stack is `floor` deep.
    fn drain_stack(&mut self, floor: usize) {
        while self.stack.len() > floor {
            if let Some(value) = self.stack.pop() {
                value.drop_with_heap(&mut self.heap);
            }
        }
    }

    #[inline]
    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("no active frame")
    }

    #[inline]
    fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("no active frame")
    }

    #[inline]
    fn jump_to(&mut self, target: usize) {
        self.frame_mut().ip = target;
    }

    fn name(&self, index: usize) -> RunResult<Rc<str>> {
        self.frame()
            .names
            .get(index)
            .cloned()
            .ok_or_else(|| ExcType::system_error("name index out of range"))
    }

    /// A new reference to the object at `id`.
    fn new_ref(&self, id: HeapId) -> Value {
        self.heap.inc_ref(id);
        Value::Ref(id)
    }

    // ========================================================================
    // Host API: code and objects
    // ========================================================================

    /// Materialises a code image, and any nested code constants, as a heap `Code` object.
    pub fn load_code(&mut self, image: &CodeImage) -> Result<Value, Exception> {
        self.materialize(image).map_err(|err| self.public_error(err))
    }

    fn materialize(&mut self, image: &CodeImage) -> RunResult<Value> {
        let mut consts = Vec::with_capacity(image.consts.len());
        for constant in &image.consts {
            match self.const_value(constant) {
                Ok(value) => consts.push(value),
                Err(err) => {
                    consts.drop_with_heap(&mut self.heap);
                    return Err(err);
                }
            }
        }
        let names = image.names.iter().map(|name| Rc::from(name.as_str())).collect();
        let code = Code::new(
            Rc::from(image.bytecode.as_slice()),
            consts,
            names,
            Rc::from(image.filename.as_str()),
        );
        Ok(self.heap.allocate_value(HeapData::Code(code))?)
    }

    fn const_value(&mut self, constant: &Const) -> RunResult<Value> {
        let data = match constant {
            Const::None => return Ok(self.heap.none()),
            Const::Int(i) => HeapData::Int(*i),
            Const::Float(f) => HeapData::Float(*f),
            Const::Str(s) => HeapData::Str(Str::from(s.as_str())),
            Const::Code(code) => return self.materialize(code),
        };
        Ok(self.heap.allocate_value(data)?)
    }

    fn allocate_public(&mut self, data: HeapData) -> Result<Value, Exception> {
        self.heap
            .allocate_value(data)
            .map_err(|err| self.public_error(err.into()))
    }

    pub fn new_int(&mut self, i: i64) -> Result<Value, Exception> {
        self.allocate_public(HeapData::Int(i))
    }

    pub fn new_float(&mut self, f: f64) -> Result<Value, Exception> {
        self.allocate_public(HeapData::Float(f))
    }

    pub fn new_str(&mut self, s: &str) -> Result<Value, Exception> {
        self.allocate_public(HeapData::Str(Str::from(s)))
    }

    /// A new list taking ownership of `items`.
    pub fn new_list(&mut self, items: Vec<Value>) -> Result<Value, Exception> {
        self.allocate_public(HeapData::List(List::from_vec(items)))
    }

    /// A new tuple taking ownership of `items`.
    pub fn new_tuple(&mut self, items: Vec<Value>) -> Result<Value, Exception> {
        self.allocate_public(HeapData::Tuple(Tuple::from_vec(items)))
    }

    pub fn new_dict(&mut self) -> Result<Value, Exception> {
        self.allocate_public(HeapData::Dict(Dict::new()))
    }

    /// Registers an empty module under `name`, so `IMPORT_NAME name` finds it.
    ///
    /// Returns a new reference to the module; populate it with [`Self::set_attr`].
    pub fn add_module(&mut self, name: &str) -> Result<Value, Exception> {
        self.register_module(name).map_err(|err| self.public_error(err))
    }

    fn register_module(&mut self, name: &str) -> RunResult<Value> {
        let attrs = self.heap.allocate_value(HeapData::Dict(Dict::new()))?;
        let module_name = match self.heap.allocate_value(HeapData::Str(Str::from(name))) {
            Ok(module_name) => module_name,
            Err(err) => {
                attrs.drop_with_heap(&mut self.heap);
                return Err(err.into());
            }
        };
        let module = self
            .heap
            .allocate_value(HeapData::Module(Module::new(module_name, attrs)))?;
        let entry = module.clone_with_heap(&self.heap);
        if let Err(err) = dict_insert(&mut self.heap, self.modules.id(), name.as_bytes(), entry) {
            module.drop_with_heap(&mut self.heap);
            return Err(err);
        }
        Ok(module)
    }

    // ========================================================================
    // Host API: reference counting
    // ========================================================================

    /// Acquires another reference to `value`'s object.
    #[must_use]
    pub fn acquire(&self, value: &Value) -> Value {
        value.clone_with_heap(&self.heap)
    }

    /// Releases a reference. Releasing None is a no-op.
    pub fn release(&mut self, value: impl Into<Option<Value>>) {
        value.into().drop_with_heap(&mut self.heap);
    }

    #[must_use]
    pub fn refcount(&self, value: &Value) -> usize {
        self.heap.get_refcount(value.id())
    }

    /// True while the object at `id` has not been destroyed.
    #[must_use]
    pub fn is_live(&self, id: HeapId) -> bool {
        self.heap.is_live(id)
    }

    #[must_use]
    pub fn kind(&self, value: &Value) -> Kind {
        self.heap.kind(value.id())
    }

    /// A new reference to the None singleton.
    #[must_use]
    pub fn none(&self) -> Value {
        self.heap.none()
    }

    /// A new reference to the True or False singleton.
    #[must_use]
    pub fn bool_value(&self, b: bool) -> Value {
        self.heap.bool_value(b)
    }

    /// Truth value as `UNARY_NOT` and the conditional jumps see it.
    #[must_use]
    pub fn is_truthy(&self, value: &Value) -> bool {
        self.heap.get(value.id()).is_truthy()
    }

    /// Borrowed reference to the class a member was instantiated from.
    #[must_use]
    pub fn member_class(&self, member: &Value) -> Option<&Value> {
        match self.heap.get(member.id()) {
            HeapData::ClassMember(member) => Some(member.class()),
            _ => None,
        }
    }

    /// Borrowed `(function, self)` of a bound method.
    #[must_use]
    pub fn bound_method_parts(&self, method: &Value) -> Option<(&Value, &Value)> {
        match self.heap.get(method.id()) {
            HeapData::ClassMethod(method) => Some((method.func(), method.self_())),
            _ => None,
        }
    }

    // ========================================================================
    // Host API: containers and dispatch
    // ========================================================================

    /// Borrowed reference to `dict[key]`; None if absent or `dict` is not a dict.
    #[must_use]
    pub fn dict_lookup(&self, dict: &Value, key: &str) -> Option<&Value> {
        dict_lookup(&self.heap, dict.id(), key.as_bytes())
    }

    /// Stores `value` under `key`, consuming the reference.
    pub fn dict_insert(&mut self, dict: &Value, key: &str, value: Value) -> Result<(), Exception> {
        dict_insert(&mut self.heap, dict.id(), key.as_bytes(), value).map_err(|err| self.public_error(err))
    }

    pub fn dict_remove(&mut self, dict: &Value, key: &str) -> Result<(), Exception> {
        dict_remove(&mut self.heap, dict.id(), key.as_bytes()).map_err(|err| self.public_error(err))
    }

    /// Number of live entries.
    #[must_use]
    pub fn dict_len(&self, dict: &Value) -> Option<usize> {
        match self.heap.get(dict.id()) {
            HeapData::Dict(d) => Some(d.len()),
            _ => None,
        }
    }

    /// Table capacity, which is not the number of entries.
    #[must_use]
    pub fn dict_capacity(&self, dict: &Value) -> Option<usize> {
        match self.heap.get(dict.id()) {
            HeapData::Dict(d) => Some(d.capacity()),
            _ => None,
        }
    }

    /// Key held in table slot `index`, or None for an empty or deleted slot.
    ///
    /// Walk `0..dict_capacity()` and skip the Nones.
    #[must_use]
    pub fn dict_key_at(&self, dict: &Value, index: usize) -> Option<String> {
        match self.heap.get(dict.id()) {
            HeapData::Dict(d) => d.key_at(index).map(|key| String::from_utf8_lossy(key).into_owned()),
            _ => None,
        }
    }

    /// Borrowed reference to item `index` of a list.
    #[must_use]
    pub fn list_get(&self, list: &Value, index: usize) -> Option<&Value> {
        match self.heap.get(list.id()) {
            HeapData::List(l) => l.get(index),
            _ => None,
        }
    }

    /// Replaces item `index` of a list, consuming `value` and releasing the old item.
    pub fn list_set(&mut self, list: &Value, index: usize, value: Value) -> Result<(), Exception> {
        let result = self.heap.with_entry_mut(list.id(), |heap, data| match data {
            HeapData::List(l) => l.set(index, value, heap),
            _ => {
                value.drop_with_heap(heap);
                Err(ExcType::badcall())
            }
        });
        result.map_err(|err| self.public_error(err))
    }

    /// Inserts before `index`, clamped to the list bounds.
    pub fn list_insert(&mut self, list: &Value, index: i64, value: Value) -> Result<(), Exception> {
        let result = self.heap.with_entry_mut(list.id(), |heap, data| match data {
            HeapData::List(l) => l.insert(index, value, heap).map_err(RunError::from),
            _ => {
                value.drop_with_heap(heap);
                Err(ExcType::badcall())
            }
        });
        result.map_err(|err| self.public_error(err))
    }

    pub fn list_append(&mut self, list: &Value, value: Value) -> Result<(), Exception> {
        let result = self.heap.with_entry_mut(list.id(), |heap, data| match data {
            HeapData::List(l) => l.append(value, heap).map_err(RunError::from),
            _ => {
                value.drop_with_heap(heap);
                Err(ExcType::badcall())
            }
        });
        result.map_err(|err| self.public_error(err))
    }

    /// Rebinds item `index` of a tuple, consuming `value` and releasing the old item.
    ///
    /// The tuple's length never changes.
    pub fn tuple_set(&mut self, tuple: &Value, index: usize, value: Value) -> Result<(), Exception> {
        let result = self.heap.with_entry_mut(tuple.id(), |heap, data| match data {
            HeapData::Tuple(t) => t.set(index, value, heap),
            _ => {
                value.drop_with_heap(heap);
                Err(ExcType::badcall())
            }
        });
        result.map_err(|err| self.public_error(err))
    }

    /// Length of a sequence, or entry count of a dict.
    #[must_use]
    pub fn len(&self, value: &Value) -> Option<usize> {
        self.heap.get(value.id()).py_len()
    }

    /// `seq[index]`; negative indices count from the end.
    pub fn index(&mut self, seq: &Value, index: i64) -> Result<Value, Exception> {
        dispatch::index(&mut self.heap, seq, index).map_err(|err| self.public_error(err))
    }

    /// `seq[lo:hi]`, with None for an absent bound.
    pub fn slice(&mut self, seq: &Value, lo: Option<i64>, hi: Option<i64>) -> Result<Value, Exception> {
        dispatch::slice(&mut self.heap, seq, lo, hi).map_err(|err| self.public_error(err))
    }

    pub fn concat(&mut self, v: &Value, w: &Value) -> Result<Value, Exception> {
        dispatch::concat(&mut self.heap, v, w).map_err(|err| self.public_error(err))
    }

    /// Three-way comparison under the total order over all objects.
    pub fn compare(&self, v: &Value, w: &Value) -> Result<Ordering, Exception> {
        dispatch::compare(&self.heap, v.id(), w.id()).map_err(|err| match err {
            RunError::Exc(exc) => exc.into(),
            RunError::Propagated => SimpleException::new(ExcType::SystemError, None).into(),
        })
    }

    /// `obj.name`, with the same rules as `LOAD_ATTR`.
    pub fn get_attr(&mut self, obj: &Value, name: &str) -> Result<Value, Exception> {
        self.load_attr(obj, name).map_err(|err| self.public_error(err))
    }

    /// `obj.name = value`, consuming `value`.
    pub fn set_attr(&mut self, obj: &Value, name: &str, value: Value) -> Result<(), Exception> {
        self.store_attr(obj, name, value).map_err(|err| self.public_error(err))
    }

    /// Converts `value` into a host [`Object`] without consuming it.
    #[must_use]
    pub fn to_object(&self, value: &Value) -> Object {
        Object::from_heap(&self.heap, value.id())
    }

    /// Builds a heap object from a host [`Object`].
    pub fn from_object(&mut self, object: &Object) -> Result<Value, InvalidInputError> {
        object.to_value(&mut self.heap)
    }

    // ========================================================================
    // Host API: introspection
    // ========================================================================

    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.heap_stats()
    }

    /// Number of live heap objects, excluding the pinned singletons.
    #[cfg(feature = "ref-count-return")]
    #[must_use]
    pub fn heap_entry_count(&self) -> usize {
        self.heap.entry_count()
    }

    /// Number of frames currently executing.
    #[must_use]
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn tracer(&self) -> &Tr {
        &self.tracer
    }

    pub fn tracer_mut(&mut self) -> &mut Tr {
        &mut self.tracer
    }

    #[must_use]
    pub fn tracker(&self) -> &T {
        self.heap.tracker()
    }

    /// Converts an internal error for the host. Errors already in the slot are
    /// taken out of it, together with the traceback.
    fn public_error(&mut self, err: RunError) -> Exception {
        match err {
            RunError::Exc(exc) => exc.into(),
            RunError::Propagated => self
                .take_exception()
                .unwrap_or_else(|| SimpleException::new_msg(ExcType::SystemError, "ghost error").into()),
        }
    }
}

/// With `ref-count-panic`, the handles the interpreter still holds are marked
/// released; the heap they point into is being dropped with them.
#[cfg(feature = "ref-count-panic")]
impl<T: ResourceTracker, Tr: VmTracer> Drop for Interpreter<T, Tr> {
    fn drop(&mut self) {
        for value in &mut self.stack {
            value.dec_ref_forget();
        }
        for frame in &mut self.frames {
            frame.frame.dec_ref_forget();
        }
        if let Some((exc, value)) = &mut self.error {
            exc.dec_ref_forget();
            value.dec_ref_forget();
        }
        if let Some(traceback) = &mut self.traceback {
            traceback.dec_ref_forget();
        }
        self.builtins.dec_ref_forget();
        self.modules.dec_ref_forget();
        for (_, exc) in &mut self.exceptions {
            exc.dec_ref_forget();
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bytecode::CodeBuilder;

    fn run(builder: CodeBuilder) -> (Interpreter, Option<Value>) {
        let mut interp = Interpreter::new();
        let code = interp.load_code(&builder.build()).unwrap();
        let globals = interp.new_dict().unwrap();
        let result = interp.eval(&code, &globals, &globals, None);
        interp.release(code);
        interp.release(globals);
        (interp, result)
    }

    #[test]
    fn rot_three_moves_top_below_the_next_two() {
        let mut builder = CodeBuilder::new("t.py");
        builder.load_const(1).load_const(2).load_const(3).emit(Opcode::RotThree);
        builder.emit_arg(Opcode::BuildTuple, 3).emit(Opcode::ReturnValue);
        let (mut interp, result) = run(builder);
        let result = result.unwrap();
        assert_eq!(
            interp.to_object(&result),
            Object::Tuple(vec![Object::Int(3), Object::Int(1), Object::Int(2)])
        );
        interp.release(result);
    }

    #[test]
    fn running_off_the_end_is_a_system_error() {
        let mut builder = CodeBuilder::new("t.py");
        builder.load_const(1);
        let (mut interp, result) = run(builder);
        assert!(result.is_none());
        assert_eq!(interp.error_type(), Some(ExcType::SystemError));
        let exc = interp.take_exception().unwrap();
        assert_eq!(exc.message(), Some("bytecode ran off the end"));
        assert_eq!(interp.stack.len(), 0, "the frame's leftovers are drained");
    }

    #[test]
    fn pop_underflow_does_not_reach_the_callers_values() {
        let mut builder = CodeBuilder::new("t.py");
        builder.emit(Opcode::PopTop);
        let mut interp = Interpreter::new();
        let code = interp.load_code(&builder.build()).unwrap();
        let globals = interp.new_dict().unwrap();
        let arg = interp.new_int(5).unwrap();
        // the argument is the frame's own value, so one pop succeeds and the frame runs off the end
        assert!(interp.eval(&code, &globals, &globals, Some(arg)).is_none());
        assert_eq!(interp.take_exception().unwrap().message(), Some("bytecode ran off the end"));
        interp.release(code);
        interp.release(globals);
    }

    #[test]
    fn unwind_reason_names() {
        assert_eq!(UnwindReason::Exception.to_string(), "exception");
        assert_eq!(UnwindReason::Break.to_string(), "break");
    }
}
