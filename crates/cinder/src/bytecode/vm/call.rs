//! The call convention.
//!
//! A call passes at most one argument. Several arguments travel as a tuple the
//! callee unpacks itself; a user function without arguments starts with an empty
//! stack and `REFUSE_ARGS` checks exactly that.

use super::Interpreter;
use crate::{
    builtins::{self, NativeFunction},
    exception_private::{ExcType, RunResult},
    heap::{DropWithHeap, HeapData},
    resource::ResourceTracker,
    tracer::VmTracer,
    types::{ClassMember, Dict, Tuple},
    value::Value,
};

/// What a callable resolves to, copied out of the heap before anything runs.
enum Target {
    Native(NativeFunction),
    Class,
    Bound { func: Value, self_: Value },
    Func { code: Value, globals: Value },
}

impl<T: ResourceTracker, Tr: VmTracer> Interpreter<T, Tr> {
    /// Calls `callee` with an optional argument, consuming the argument.
    pub(super) fn call_value(&mut self, callee: &Value, arg: Option<Value>) -> RunResult<Value> {
        let target = match self.heap.get(callee.id()) {
            HeapData::Method(method) => Target::Native(method.function()),
            HeapData::Class(_) => Target::Class,
            HeapData::ClassMethod(method) => Target::Bound {
                func: method.func().clone_with_heap(&self.heap),
                self_: method.self_().clone_with_heap(&self.heap),
            },
            HeapData::Func(func) => Target::Func {
                code: func.code().clone_with_heap(&self.heap),
                globals: func.globals().clone_with_heap(&self.heap),
            },
            _ => {
                arg.drop_with_heap(&mut self.heap);
                return Err(ExcType::type_error("call of non-function"));
            }
        };

        match target {
            Target::Native(function) => builtins::call_native(&mut self.heap, function, arg),
            Target::Class => self.instantiate(callee, arg),
            Target::Bound { func, self_ } => {
                let arg = match arg {
                    None => self_,
                    Some(arg) => {
                        match self
                            .heap
                            .allocate_value(HeapData::Tuple(Tuple::from_vec(vec![self_, arg])))
                        {
                            Ok(pair) => pair,
                            Err(err) => {
                                func.drop_with_heap(&mut self.heap);
                                return Err(err.into());
                            }
                        }
                    }
                };
                let result = self.call_value(&func, Some(arg));
                func.drop_with_heap(&mut self.heap);
                result
            }
            Target::Func { code, globals } => {
                let result = self.run_function(&code, &globals, arg);
                code.drop_with_heap(&mut self.heap);
                globals.drop_with_heap(&mut self.heap);
                result
            }
        }
    }

    /// Runs a user function in a fresh locals dict.
    fn run_function(&mut self, code: &Value, globals: &Value, arg: Option<Value>) -> RunResult<Value> {
        let locals = match self.heap.allocate_value(HeapData::Dict(Dict::new())) {
            Ok(locals) => locals,
            Err(err) => {
                arg.drop_with_heap(&mut self.heap);
                return Err(err.into());
            }
        };
        let result = self.eval_code(code, globals, &locals, arg);
        locals.drop_with_heap(&mut self.heap);
        result
    }

    /// Calling a class creates a member with an empty attribute dict.
    fn instantiate(&mut self, class: &Value, arg: Option<Value>) -> RunResult<Value> {
        if let Some(arg) = arg {
            arg.drop_with_heap(&mut self.heap);
            return Err(ExcType::type_error("no arguments allowed for class instantiation"));
        }
        let attrs = self.heap.allocate_value(HeapData::Dict(Dict::new()))?;
        let class = class.clone_with_heap(&self.heap);
        Ok(self
            .heap
            .allocate_value(HeapData::ClassMember(ClassMember::new(class, attrs)))?)
    }
}
