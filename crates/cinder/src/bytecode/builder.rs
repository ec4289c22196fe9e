//! Bytecode assembler.
//!
//! `CodeBuilder` encodes opcodes and operands into raw bytes, collects the
//! constant and name tables, and patches forward jumps once their target is known.

use super::{
    image::{CodeImage, Const},
    op::{CompareOp, Opcode},
};

/// Position of a jump instruction whose operand still needs patching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a forward jump must be patched"]
pub struct JumpLabel(usize);

/// Builder for one `CodeImage`.
///
/// # Usage
///
/// ```
/// use cinder::{CodeBuilder, Opcode};
///
/// let mut builder = CodeBuilder::new("main.py");
/// builder.load_const(1).load_const(2).emit(Opcode::BinaryAdd);
/// builder.emit(Opcode::ReturnValue);
/// let image = builder.build();
/// assert_eq!(image.consts.len(), 2);
/// ```
#[derive(Debug)]
pub struct CodeBuilder {
    filename: String,
    bytecode: Vec<u8>,
    consts: Vec<Const>,
    /// Name table. Names are interned, so repeated uses share one index.
    names: Vec<String>,
}

impl CodeBuilder {
    #[must_use]
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            bytecode: Vec::new(),
            consts: Vec::new(),
            names: Vec::new(),
        }
    }

    /// Emits a no-operand instruction.
    pub fn emit(&mut self, op: Opcode) -> &mut Self {
        debug_assert!(!op.has_argument(), "{op} needs an operand");
        self.bytecode.push(op as u8);
        self
    }

    /// Emits an instruction followed by its little-endian `u16` operand.
    pub fn emit_arg(&mut self, op: Opcode, arg: u16) -> &mut Self {
        debug_assert!(op.has_argument(), "{op} takes no operand");
        self.bytecode.push(op as u8);
        self.bytecode.extend_from_slice(&arg.to_le_bytes());
        self
    }

    /// Appends a raw byte, bypassing the opcode table.
    pub fn emit_raw(&mut self, byte: u8) -> &mut Self {
        self.bytecode.push(byte);
        self
    }

    /// Adds a constant and returns its index. Constants are not deduplicated.
    pub fn add_const(&mut self, value: impl Into<Const>) -> u16 {
        let index = u16::try_from(self.consts.len()).expect("constant table exceeds u16 range");
        self.consts.push(value.into());
        index
    }

    /// Returns the index of `name` in the name table, adding it if needed.
    pub fn add_name(&mut self, name: &str) -> u16 {
        let index = match self.names.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                self.names.push(name.to_owned());
                self.names.len() - 1
            }
        };
        u16::try_from(index).expect("name table exceeds u16 range")
    }

    /// `LOAD_CONST` of a new constant.
    pub fn load_const(&mut self, value: impl Into<Const>) -> &mut Self {
        let index = self.add_const(value);
        self.emit_arg(Opcode::LoadConst, index)
    }

    /// Emits an instruction whose operand is a name table index
    /// (`LOAD_NAME`, `STORE_NAME`, `LOAD_ATTR`, `IMPORT_NAME`, ...).
    pub fn emit_name(&mut self, op: Opcode, name: &str) -> &mut Self {
        let index = self.add_name(name);
        self.emit_arg(op, index)
    }

    pub fn compare(&mut self, op: CompareOp) -> &mut Self {
        self.emit_arg(Opcode::CompareOp, u16::from(op as u8))
    }

    pub fn set_lineno(&mut self, line: u16) -> &mut Self {
        self.emit_arg(Opcode::SetLineno, line)
    }

    /// Emits a relative jump (or block setup) with a placeholder operand.
    ///
    /// Call [`Self::patch_jump`] once the target has been emitted.
    pub fn emit_jump(&mut self, op: Opcode) -> JumpLabel {
        debug_assert!(op.is_relative_jump(), "{op} is not a relative jump");
        let label = JumpLabel(self.bytecode.len());
        self.emit_arg(op, 0);
        label
    }

    /// Points a pending jump at the current offset.
    ///
    /// # Panics
    /// Panics if the distance does not fit in the `u16` operand.
    pub fn patch_jump(&mut self, label: JumpLabel) {
        let next = label.0 + 3;
        let distance = u16::try_from(self.bytecode.len() - next).expect("jump distance exceeds u16 range");
        self.bytecode[label.0 + 1..next].copy_from_slice(&distance.to_le_bytes());
    }

    /// Emits `JUMP_ABSOLUTE` to a known offset, usually a loop head.
    pub fn emit_jump_absolute(&mut self, target: usize) -> &mut Self {
        let target = u16::try_from(target).expect("jump target exceeds u16 range");
        self.emit_arg(Opcode::JumpAbsolute, target)
    }

    /// Offset of the next instruction to be emitted.
    #[must_use]
    pub fn current_offset(&self) -> usize {
        self.bytecode.len()
    }

    #[must_use]
    pub fn build(self) -> CodeImage {
        CodeImage {
            filename: self.filename,
            bytecode: self.bytecode,
            consts: self.consts,
            names: self.names,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn operands_are_little_endian() {
        let mut builder = CodeBuilder::new("t.py");
        builder.set_lineno(0x0102);
        assert_eq!(builder.build().bytecode, vec![127, 0x02, 0x01]);
    }

    #[test]
    fn names_are_interned() {
        let mut builder = CodeBuilder::new("t.py");
        builder.emit_name(Opcode::StoreName, "x").emit_name(Opcode::LoadName, "x");
        builder.emit_name(Opcode::LoadName, "y");
        let image = builder.build();
        assert_eq!(image.names, vec!["x".to_owned(), "y".to_owned()]);
        assert_eq!(image.bytecode, vec![90, 0, 0, 101, 0, 0, 101, 1, 0]);
    }

    #[test]
    fn forward_jump_is_relative_to_next_instruction() {
        let mut builder = CodeBuilder::new("t.py");
        let jump = builder.emit_jump(Opcode::JumpForward);
        builder.emit(Opcode::PopTop).emit(Opcode::PopTop);
        builder.patch_jump(jump);
        builder.emit(Opcode::ReturnValue);
        assert_eq!(builder.build().bytecode, vec![110, 2, 0, 1, 1, 83]);
    }
}
