#![doc = include_str!("../../../README.md")]
mod heap;

mod builtins;
mod bytecode;
mod exception_private;
mod exception_public;
mod io;
mod modules;
mod object;
mod resource;
mod run;
pub mod tracer;
mod types;
mod value;

#[cfg(feature = "ref-count-return")]
pub use crate::run::RefCountOutput;
pub use crate::{
    bytecode::{
        CodeBuilder, CodeImage, CompareOp, Const, HAVE_ARGUMENT, Interpreter, JumpLabel, Opcode, UnwindReason,
        disassemble,
    },
    exception_private::ExcType,
    exception_public::{Exception, StackFrame},
    heap::{HeapId, HeapStats},
    io::{CollectStringPrint, PrintWriter, StdPrint},
    object::{ConversionError, InvalidInputError, Object},
    resource::{
        DEFAULT_MAX_RECURSION_DEPTH, LimitedTracker, MAX_DATA_RECURSION_DEPTH, NoLimitTracker, ResourceError,
        ResourceLimits, ResourceTracker,
    },
    run::Runner,
    tracer::{
        CoverageTracer, NoopTracer, ProfilingReport, ProfilingTracer, RecordingTracer, StderrTracer, TraceEvent,
        VmTracer,
    },
    types::{BlockKind, Kind},
    value::Value,
};
