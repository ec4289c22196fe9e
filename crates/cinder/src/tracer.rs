//! Hooks the eval loop calls at dispatch, frame entry and exit, unwinding and
//! block changes.
//!
//! `Interpreter<T, Tr>` is generic over the tracer, so with [`NoopTracer`] every
//! hook is an empty inlined call.
//!
//! ```
//! use cinder::{Interpreter, NoLimitTracker, ProfilingTracer};
//!
//! let interp = Interpreter::with_tracker(NoLimitTracker, ProfilingTracer::new());
//! assert_eq!(interp.tracer().report().total_instructions, 0);
//! ```

use std::fmt;

use ahash::{AHashMap, AHashSet};

use crate::{
    bytecode::{Opcode, UnwindReason},
    types::BlockKind,
};

/// One event captured by [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Instruction {
        /// Byte offset of the opcode.
        ip: usize,
        opcode: Opcode,
        /// Values on the current frame's stack before the opcode runs.
        stack_depth: usize,
    },
    /// Frame entered; `depth` counts the new frame.
    Call { filename: String, depth: usize },
    /// Frame left; `depth` no longer counts it.
    Return { depth: usize },
    Unwind { reason: UnwindReason, depth: usize },
    /// Block stack depth after the push.
    BlockPush { kind: BlockKind, depth: usize },
    /// Block stack depth after the pop.
    BlockPop { depth: usize },
}

/// Observer of interpreter execution. Every hook defaults to a no-op.
pub trait VmTracer: fmt::Debug {
    /// Before each opcode dispatch. `stack_depth` is relative to the current frame.
    #[inline(always)]
    fn on_instruction(&mut self, _ip: usize, _opcode: Opcode, _stack_depth: usize, _frame_depth: usize) {}

    /// After a frame is pushed; `depth` includes it.
    #[inline(always)]
    fn on_call(&mut self, _filename: &str, _depth: usize) {}

    /// After a frame is popped, normally or by error.
    #[inline(always)]
    fn on_return(&mut self, _depth: usize) {}

    /// When an instruction leaves a reason other than "none".
    #[inline(always)]
    fn on_unwind(&mut self, _reason: UnwindReason, _depth: usize) {}

    #[inline(always)]
    fn on_block_push(&mut self, _kind: BlockKind, _depth: usize) {}

    #[inline(always)]
    fn on_block_pop(&mut self, _depth: usize) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

// ============================================================================
// StderrTracer
// ============================================================================

/// Writes one line per event to stderr, optionally stopping after a number of
/// instructions.
#[derive(Debug, Default)]
pub struct StderrTracer {
    remaining: Option<usize>,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self { remaining: Some(limit) }
    }

    fn active(&self) -> bool {
        self.remaining != Some(0)
    }

    fn line(&self, args: fmt::Arguments<'_>) {
        if self.active() {
            eprintln!("{args}");
        }
    }
}

impl VmTracer for StderrTracer {
    fn on_instruction(&mut self, ip: usize, opcode: Opcode, stack_depth: usize, frame_depth: usize) {
        let name: &'static str = opcode.into();
        self.line(format_args!("{ip:>5} {name:<16} stack={stack_depth} frames={frame_depth}"));
        if let Some(remaining) = &mut self.remaining
            && *remaining > 0
        {
            *remaining -= 1;
            if *remaining == 0 {
                eprintln!("(trace limit reached)");
            }
        }
    }

    fn on_call(&mut self, filename: &str, depth: usize) {
        self.line(format_args!("call {filename} depth={depth}"));
    }

    fn on_return(&mut self, depth: usize) {
        self.line(format_args!("return depth={depth}"));
    }

    fn on_unwind(&mut self, reason: UnwindReason, depth: usize) {
        self.line(format_args!("unwind {reason} depth={depth}"));
    }

    fn on_block_push(&mut self, kind: BlockKind, depth: usize) {
        self.line(format_args!("block push {kind} blocks={depth}"));
    }

    fn on_block_pop(&mut self, depth: usize) {
        self.line(format_args!("block pop blocks={depth}"));
    }
}

// ============================================================================
// ProfilingTracer
// ============================================================================

/// Counts dispatches per opcode, frames entered, unwinds and the deepest frame
/// and block stacks seen.
#[derive(Debug, Default)]
pub struct ProfilingTracer {
    opcode_counts: AHashMap<Opcode, u64>,
    total_instructions: u64,
    max_depth: usize,
    total_calls: u64,
    total_unwinds: u64,
    max_blocks: usize,
}

#[derive(Debug)]
pub struct ProfilingReport {
    /// Most frequent first; ties ordered by opcode value.
    pub opcode_counts: Vec<(Opcode, u64)>,
    pub total_instructions: u64,
    pub max_depth: usize,
    pub total_calls: u64,
    pub total_unwinds: u64,
    pub max_blocks: usize,
}

impl ProfilingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn report(&self) -> ProfilingReport {
        let mut opcode_counts: Vec<_> = self.opcode_counts.iter().map(|(&op, &n)| (op, n)).collect();
        opcode_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| (a.0 as u8).cmp(&(b.0 as u8))));
        ProfilingReport {
            opcode_counts,
            total_instructions: self.total_instructions,
            max_depth: self.max_depth,
            total_calls: self.total_calls,
            total_unwinds: self.total_unwinds,
            max_blocks: self.max_blocks,
        }
    }
}

impl VmTracer for ProfilingTracer {
    #[inline]
    fn on_instruction(&mut self, _ip: usize, opcode: Opcode, _stack_depth: usize, _frame_depth: usize) {
        *self.opcode_counts.entry(opcode).or_insert(0) += 1;
        self.total_instructions += 1;
    }

    fn on_call(&mut self, _filename: &str, depth: usize) {
        self.total_calls += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    fn on_unwind(&mut self, _reason: UnwindReason, _depth: usize) {
        self.total_unwinds += 1;
    }

    fn on_block_push(&mut self, _kind: BlockKind, depth: usize) {
        self.max_blocks = self.max_blocks.max(depth);
    }
}

impl fmt::Display for ProfilingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "instructions {}, frames {} (max depth {}), unwinds {}, max blocks {}",
            self.total_instructions, self.total_calls, self.max_depth, self.total_unwinds, self.max_blocks
        )?;
        for (opcode, count) in &self.opcode_counts {
            writeln!(f, "{count:>10}  {opcode}")?;
        }
        Ok(())
    }
}

// ============================================================================
// CoverageTracer
// ============================================================================

/// Executed offsets per code filename. Offsets inside a call are attributed to
/// the callee's file.
#[derive(Debug, Default)]
pub struct CoverageTracer {
    files: Vec<String>,
    covered: AHashMap<String, AHashSet<usize>>,
}

impl CoverageTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn covered_ips(&self, filename: &str) -> Option<&AHashSet<usize>> {
        self.covered.get(filename)
    }

    /// Distinct (file, offset) pairs executed.
    #[must_use]
    pub fn coverage_count(&self) -> usize {
        self.covered.values().map(|s| s.len()).sum()
    }
}

impl VmTracer for CoverageTracer {
    fn on_instruction(&mut self, ip: usize, _opcode: Opcode, _stack_depth: usize, _frame_depth: usize) {
        let file = self.files.last().map_or("", String::as_str);
        match self.covered.get_mut(file) {
            Some(ips) => {
                ips.insert(ip);
            }
            None => {
                self.covered.insert(file.to_owned(), AHashSet::from_iter([ip]));
            }
        }
    }

    fn on_call(&mut self, filename: &str, _depth: usize) {
        self.files.push(filename.to_owned());
    }

    fn on_return(&mut self, _depth: usize) {
        self.files.pop();
    }
}

// ============================================================================
// RecordingTracer
// ============================================================================

/// Keeps every event, up to an optional limit. Meant for tests and short runs.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
    limit: Option<usize>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::new(),
            limit: Some(limit),
        }
    }

    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// The dispatched opcodes, in order.
    #[must_use]
    pub fn opcodes(&self) -> Vec<Opcode> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Instruction { opcode, .. } => Some(*opcode),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, event: TraceEvent) {
        if self.limit.is_none_or(|limit| self.events.len() < limit) {
            self.events.push(event);
        }
    }
}

impl VmTracer for RecordingTracer {
    fn on_instruction(&mut self, ip: usize, opcode: Opcode, stack_depth: usize, _frame_depth: usize) {
        self.record(TraceEvent::Instruction {
            ip,
            opcode,
            stack_depth,
        });
    }

    fn on_call(&mut self, filename: &str, depth: usize) {
        self.record(TraceEvent::Call {
            filename: filename.to_owned(),
            depth,
        });
    }

    fn on_return(&mut self, depth: usize) {
        self.record(TraceEvent::Return { depth });
    }

    fn on_unwind(&mut self, reason: UnwindReason, depth: usize) {
        self.record(TraceEvent::Unwind { reason, depth });
    }

    fn on_block_push(&mut self, kind: BlockKind, depth: usize) {
        self.record(TraceEvent::BlockPush { kind, depth });
    }

    fn on_block_pop(&mut self, depth: usize) {
        self.record(TraceEvent::BlockPop { depth });
    }
}
