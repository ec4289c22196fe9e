//! Bytecode: the instruction encoding, code images, the assembler, the
//! disassembler and the interpreter that executes it all.
//!
//! # Module Structure
//!
//! - `op` - opcode and comparison-operator encodings
//! - `image` - serialisable compiled code (`CodeImage`)
//! - `builder` - `CodeBuilder`, the assembler used in place of a compiler
//! - `dis` - human-readable listings
//! - `vm` - the interpreter: eval loop, unwind state machine and call convention

mod builder;
mod dis;
mod image;
mod op;
mod vm;

pub use builder::{CodeBuilder, JumpLabel};
pub use dis::disassemble;
pub use image::{CodeImage, Const};
pub use op::{CompareOp, HAVE_ARGUMENT, Opcode};
pub use vm::{Interpreter, UnwindReason};
