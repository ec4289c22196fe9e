//! Tests for resource limits enforced through `LimitedTracker`.
//!
//! A limit surfaces inside the running program as a MemoryError (allocation
//! and memory limits) or a RuntimeError (operations, time and call depth).

use std::time::Duration;

use cinder::{
    CodeBuilder, CodeImage, ExcType, Interpreter, LimitedTracker, NoopTracer, Object, Opcode, ResourceError,
    ResourceLimits, Runner,
};
use pretty_assertions::assert_eq;

fn run_limited(image: CodeImage, limits: ResourceLimits) -> Result<Object, cinder::Exception> {
    Runner::new(image).run(LimitedTracker::new(limits))
}

/// `return range(n)`
fn range_program(n: i64) -> CodeImage {
    let mut b = CodeBuilder::new("main.py");
    b.emit_name(Opcode::LoadName, "range").load_const(n).emit(Opcode::BinaryCall);
    b.emit(Opcode::ReturnValue);
    b.build()
}

/// `while 1: pass`
fn endless_loop() -> CodeImage {
    let mut b = CodeBuilder::new("main.py");
    let top = b.current_offset();
    b.emit_jump_absolute(top);
    b.build()
}

/// `def f(): return f()` followed by `f()`.
fn endless_recursion() -> CodeImage {
    let mut body = CodeBuilder::new("f.py");
    body.set_lineno(1).emit_name(Opcode::LoadName, "f").emit(Opcode::UnaryCall);
    body.emit(Opcode::ReturnValue);
    let mut b = CodeBuilder::new("main.py");
    b.load_const(body.build()).emit(Opcode::BuildFunction).emit_name(Opcode::StoreName, "f");
    b.set_lineno(2).emit_name(Opcode::LoadName, "f").emit(Opcode::UnaryCall);
    b.emit(Opcode::ReturnValue);
    b.build()
}

// =============================================================================
// 1. Allocation and memory
// =============================================================================

/// A program within the allocation budget runs normally.
#[test]
fn within_allocation_limit() {
    let result = run_limited(range_program(3), ResourceLimits::new().max_allocations(100)).unwrap();
    assert_eq!(result, Object::List(vec![Object::Int(0), Object::Int(1), Object::Int(2)]));
}

/// Exceeding the allocation budget raises MemoryError.
#[test]
fn allocation_limit_raises_memory_error() {
    let err = run_limited(range_program(1000), ResourceLimits::new().max_allocations(100)).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::MemoryError));
}

/// Exceeding the memory budget raises MemoryError.
#[test]
fn memory_limit_raises_memory_error() {
    let err = run_limited(range_program(100_000), ResourceLimits::new().max_memory(64 * 1024)).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::MemoryError));
}

/// Objects freed during the run give their memory back to the budget.
#[test]
fn freed_memory_is_returned_to_budget() {
    // allocate and discard a 1000-int list ten times
    let mut b = CodeBuilder::new("main.py");
    let setup = b.emit_jump(Opcode::SetupLoop);
    b.emit_name(Opcode::LoadName, "range").load_const(10).emit(Opcode::BinaryCall).load_const(0);
    let top = b.current_offset();
    let done = b.emit_jump(Opcode::ForLoop);
    b.emit(Opcode::PopTop);
    b.emit_name(Opcode::LoadName, "range").load_const(1000).emit(Opcode::BinaryCall);
    b.emit(Opcode::PopTop);
    b.emit_jump_absolute(top);
    b.patch_jump(done);
    b.emit(Opcode::PopBlock);
    b.patch_jump(setup);
    b.load_const(1).emit(Opcode::ReturnValue);

    let mut interp = Interpreter::with_tracker(
        LimitedTracker::new(ResourceLimits::new().max_memory(200 * 1024)),
        NoopTracer,
    );
    let result = Runner::new(b.build()).run_in(&mut interp).unwrap();
    assert_eq!(result, Object::Int(1));
    let stats = interp.heap_stats();
    assert!(
        stats.tracker_memory_bytes.is_some(),
        "the limited tracker reports memory usage"
    );
}

// =============================================================================
// 2. Operations and time
// =============================================================================

/// An endless loop stops at the operation limit with a RuntimeError.
#[test]
fn operation_limit_stops_endless_loop() {
    let err = run_limited(endless_loop(), ResourceLimits::new().max_operations(1000)).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::RuntimeError));
    assert_eq!(err.message(), Some("operation limit exceeded: 1001 > 1000"));
}

/// An endless loop stops at the time limit.
#[test]
fn time_limit_stops_endless_loop() {
    let err = run_limited(endless_loop(), ResourceLimits::new().max_duration(Duration::from_millis(50))).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::RuntimeError));
    assert!(
        err.message().is_some_and(|m| m.starts_with("time limit exceeded")),
        "unexpected message: {err}"
    );
}

/// The tracker counts executed instructions.
#[test]
fn operation_count_is_observable() {
    let mut b = CodeBuilder::new("main.py");
    b.load_const(1).load_const(2).emit(Opcode::BinaryAdd).emit(Opcode::ReturnValue);
    let mut interp = Interpreter::with_tracker(
        LimitedTracker::new(ResourceLimits::new().max_operations(100)),
        NoopTracer,
    );
    Runner::new(b.build()).run_in(&mut interp).unwrap();
    assert_eq!(interp.tracker().operation_count(), 4);
}

// =============================================================================
// 3. Call depth
// =============================================================================

/// Unbounded recursion stops at the call depth limit with one traceback entry per frame.
#[test]
fn recursion_limit() {
    let limits = ResourceLimits::new().max_recursion_depth(Some(10));
    let err = run_limited(endless_recursion(), limits).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::RuntimeError));
    assert_eq!(err.message(), Some("maximum recursion depth exceeded"));
    assert_eq!(err.traceback().len(), 10);
    assert_eq!(err.traceback()[0].filename, "main.py");
    assert_eq!(err.traceback()[0].line, 2);
    assert!(err.traceback()[1..].iter().all(|frame| frame.filename == "f.py"));
}

/// The interpreter is usable again after a limit unwound every frame.
#[test]
fn interpreter_recovers_after_recursion_limit() {
    let limits = ResourceLimits::new().max_recursion_depth(Some(5));
    let mut interp = Interpreter::with_tracker(LimitedTracker::new(limits), NoopTracer);
    assert!(Runner::new(endless_recursion()).run_in(&mut interp).is_err());
    assert_eq!(interp.frame_depth(), 0);

    let result = Runner::new(range_program(2)).run_in(&mut interp).unwrap();
    assert_eq!(result, Object::List(vec![Object::Int(0), Object::Int(1)]));
}

// =============================================================================
// 4. Limit errors
// =============================================================================

/// Each limit maps to the runtime error type a program sees.
#[test]
fn resource_error_types() {
    let allocation = ResourceError::Allocation { limit: 1, count: 2 };
    let recursion = ResourceError::Recursion { limit: 1, depth: 2 };
    assert_eq!(allocation.exc_type(), ExcType::MemoryError);
    assert_eq!(recursion.exc_type(), ExcType::RuntimeError);
    assert_eq!(allocation.to_string(), "allocation limit exceeded: 2 > 1");
}

/// Limits round-trip through serde, as hosts store them in configuration.
#[test]
fn limits_are_serialisable() {
    let limits = ResourceLimits::new().max_operations(5).max_memory(1024);
    let bytes = postcard::to_allocvec(&limits).unwrap();
    let restored: ResourceLimits = postcard::from_bytes(&bytes).unwrap();
    assert_eq!(restored.max_operations, Some(5));
    assert_eq!(restored.max_memory, Some(1024));
    assert_eq!(restored.max_recursion_depth, Some(cinder::DEFAULT_MAX_RECURSION_DEPTH));
}
