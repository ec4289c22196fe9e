//! Built-in modules, created on first import.

pub(crate) mod math;

use strum::{Display, EnumString};

use crate::{exception_private::RunResult, heap::Heap, resource::ResourceTracker, value::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum BuiltinModule {
    Math,
}

impl BuiltinModule {
    /// Builds a fresh module object.
    pub fn create<T: ResourceTracker>(self, heap: &mut Heap<T>) -> RunResult<Value> {
        match self {
            Self::Math => math::create_module(heap),
        }
    }
}
