//! Object payloads, one type per kind.
//!
//! Every payload implements [`PyTrait`], which gives the heap what it needs to
//! account for and destroy the object. Operations that need the heap (compare,
//! concatenate, index, slice) are dispatched in [`dispatch`].
pub mod class;
pub mod code;
pub mod dict;
pub mod dispatch;
pub mod frame;
pub mod function;
pub mod kind;
pub mod list;
pub mod module;
pub mod py_trait;
pub mod str;
pub mod traceback;
pub mod tuple;

pub(crate) use class::{Class, ClassMember, ClassMethod};
pub(crate) use code::Code;
pub(crate) use dict::{Dict, dict_insert, dict_lookup, dict_remove};
pub use frame::BlockKind;
pub(crate) use frame::{Block, BlockStack, Frame, MAX_BLOCKS};
pub(crate) use function::{Func, Method};
pub use kind::Kind;
pub(crate) use list::List;
pub(crate) use module::Module;
pub(crate) use py_trait::PyTrait;
pub(crate) use str::Str;
pub(crate) use traceback::Traceback;
pub(crate) use tuple::Tuple;

/// Clamps slice bounds to `[0, len]`, with `hi < lo` treated as `hi = lo`.
pub(crate) fn clamp_slice(lo: i64, hi: i64, len: usize) -> (usize, usize) {
    let clamp = |bound: i64| usize::try_from(bound.max(0)).unwrap_or(usize::MAX).min(len);
    let lo = clamp(lo);
    let hi = clamp(hi).max(lo);
    (lo, hi)
}
