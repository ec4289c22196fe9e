//! Attribute access and imports.

use std::str::FromStr;

use super::Interpreter;
use crate::{
    exception_private::{ExcType, RunResult},
    heap::HeapData,
    modules::BuiltinModule,
    resource::ResourceTracker,
    tracer::VmTracer,
    types::{ClassMethod, PyTrait, dict_insert, dict_lookup},
    value::Value,
};

/// Result of an attribute lookup, computed with the heap borrowed.
enum Lookup {
    Ready(Value),
    /// A function found on a member's class; it is bound to the member.
    Bind { func: Value, self_: Value },
}

impl<T: ResourceTracker, Tr: VmTracer> Interpreter<T, Tr> {
    /// `obj.name`.
    ///
    /// Modules expose `__dict__` and `__name__` besides their attributes. A
    /// member's own dict is searched before its class's dict.
    pub(super) fn load_attr(&mut self, obj: &Value, name: &str) -> RunResult<Value> {
        let lookup = match self.heap.get(obj.id()) {
            HeapData::Module(module) => {
                let found = match name {
                    "__dict__" => Some(module.attrs()),
                    "__name__" => Some(module.name()),
                    _ => dict_lookup(&self.heap, module.attrs().id(), name.as_bytes()),
                };
                found.map(|value| Lookup::Ready(value.clone_with_heap(&self.heap)))
            }
            HeapData::Class(class) => dict_lookup(&self.heap, class.attrs().id(), name.as_bytes())
                .map(|value| Lookup::Ready(value.clone_with_heap(&self.heap))),
            HeapData::ClassMember(member) => {
                if let Some(value) = dict_lookup(&self.heap, member.attrs().id(), name.as_bytes()) {
                    Some(Lookup::Ready(value.clone_with_heap(&self.heap)))
                } else {
                    let HeapData::Class(class) = self.heap.get(member.class().id()) else {
                        return Err(ExcType::badcall());
                    };
                    dict_lookup(&self.heap, class.attrs().id(), name.as_bytes()).map(|value| {
                        if matches!(self.heap.get(value.id()), HeapData::Func(_)) {
                            Lookup::Bind {
                                func: value.clone_with_heap(&self.heap),
                                self_: obj.clone_with_heap(&self.heap),
                            }
                        } else {
                            Lookup::Ready(value.clone_with_heap(&self.heap))
                        }
                    })
                }
            }
            other => return Err(ExcType::type_error_unsupported("attribute access", other.py_kind())),
        };

        match lookup {
            Some(Lookup::Ready(value)) => Ok(value),
            Some(Lookup::Bind { func, self_ }) => Ok(self
                .heap
                .allocate_value(HeapData::ClassMethod(ClassMethod::new(func, self_)))?),
            None => Err(ExcType::name_error(name)),
        }
    }

    /// `obj.name = value`, consuming `value`.
    pub(super) fn store_attr(&mut self, obj: &Value, name: &str, value: Value) -> RunResult<()> {
        let attrs = match self.heap.get(obj.id()) {
            HeapData::ClassMember(member) => Ok(member.attrs().id()),
            HeapData::Module(_) if matches!(name, "__dict__" | "__name__") => {
                Err(ExcType::type_error("read-only special attribute"))
            }
            HeapData::Module(module) => Ok(module.attrs().id()),
            other => Err(ExcType::type_error_unsupported("attribute assignment", other.py_kind())),
        };
        match attrs {
            Ok(attrs) => dict_insert(&mut self.heap, attrs, name.as_bytes(), value),
            Err(err) => {
                value.drop_with_heap(&mut self.heap);
                Err(err)
            }
        }
    }

    /// `IMPORT_NAME`: a registered module, or a built-in one created on first import.
    pub(super) fn import_module(&mut self, name: &str) -> RunResult<Value> {
        if let Some(module) = dict_lookup(&self.heap, self.modules.id(), name.as_bytes()) {
            return Ok(module.clone_with_heap(&self.heap));
        }
        let Ok(builtin) = BuiltinModule::from_str(name) else {
            return Err(ExcType::name_error(name));
        };
        let module = builtin.create(&mut self.heap)?;
        let entry = module.clone_with_heap(&self.heap);
        if let Err(err) = dict_insert(&mut self.heap, self.modules.id(), name.as_bytes(), entry) {
            module.drop_with_heap(&mut self.heap);
            return Err(err);
        }
        Ok(module)
    }

    /// `IMPORT_FROM`: binds `name` from the module on top of the stack into the
    /// locals, leaving the module in place.
    pub(super) fn import_from(&mut self, name: &str) -> RunResult<()> {
        let HeapData::Module(module) = self.heap.get(self.peek()?.id()) else {
            return Err(ExcType::badcall());
        };
        let Some(value) = dict_lookup(&self.heap, module.attrs().id(), name.as_bytes()) else {
            return Err(ExcType::name_error(name));
        };
        let value = value.clone_with_heap(&self.heap);
        let locals = self.frame().locals;
        dict_insert(&mut self.heap, locals, name.as_bytes(), value)
    }
}
