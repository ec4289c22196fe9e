//! Opcode and comparison-operator encodings.
//!
//! The numeric values are the wire format shared with bytecode producers and
//! must not change. Opcodes at or above [`HAVE_ARGUMENT`] are followed by a
//! little-endian `u16` operand.

use strum::{Display, EnumIter, FromRepr, IntoStaticStr};

/// First opcode value that carries a two-byte operand.
pub const HAVE_ARGUMENT: u8 = 90;

/// One bytecode instruction.
///
/// `SLICE` occupies four values: `Slice` plus 0 to 3, where bit 1 means a low bound
/// was pushed and bit 2 a high bound.
#[repr(u8)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    FromRepr,
    Display,
    EnumIter,
    IntoStaticStr,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Opcode {
    // === Stack ===
    PopTop = 1,
    RotTwo = 2,
    RotThree = 3,
    DupTop = 4,

    // === Unary ===
    UnaryNegative = 11,
    UnaryNot = 12,
    /// Calls the top of stack with no argument.
    UnaryCall = 14,

    // === Binary: pop w, then v, push v op w ===
    BinaryMultiply = 20,
    BinaryDivide = 21,
    BinaryModulo = 22,
    BinaryAdd = 23,
    BinarySubtract = 24,
    BinarySubscr = 25,
    /// Pops the argument, then the callee.
    BinaryCall = 26,

    // === Slices ===
    Slice = 30,
    #[strum(serialize = "SLICE+1")]
    Slice1 = 31,
    #[strum(serialize = "SLICE+2")]
    Slice2 = 32,
    #[strum(serialize = "SLICE+3")]
    Slice3 = 33,

    StoreSubscr = 60,
    PrintExpr = 70,

    // === Blocks and frames ===
    BreakLoop = 80,
    LoadLocals = 82,
    ReturnValue = 83,
    RequireArgs = 84,
    RefuseArgs = 85,
    BuildFunction = 86,
    PopBlock = 87,
    BuildClass = 89,

    // === Opcodes with an argument ===
    /// Operand: index into the name list.
    StoreName = 90,
    /// Operand: item count.
    UnpackTuple = 92,
    UnpackList = 93,
    StoreAttr = 95,
    /// Operand: index into the constant list.
    LoadConst = 100,
    LoadName = 101,
    BuildTuple = 102,
    BuildList = 103,
    /// Operand is always zero.
    BuildMap = 104,
    LoadAttr = 105,
    /// Operand: a [`CompareOp`].
    CompareOp = 106,
    ImportName = 107,
    ImportFrom = 108,

    // === Jumps: relative to the next instruction unless noted ===
    JumpForward = 110,
    JumpIfFalse = 111,
    JumpIfTrue = 112,
    /// Operand: offset from the start of the code.
    JumpAbsolute = 113,
    ForLoop = 114,

    SetupLoop = 120,
    SetupExcept = 121,

    /// Operand: the source line now executing.
    SetLineno = 127,
}

impl Opcode {
    /// True when the opcode is followed by a two-byte operand.
    #[inline]
    #[must_use]
    pub fn has_argument(self) -> bool {
        self as u8 >= HAVE_ARGUMENT
    }

    /// True for opcodes whose operand is a jump distance relative to the next instruction.
    #[must_use]
    pub fn is_relative_jump(self) -> bool {
        matches!(
            self,
            Self::JumpForward | Self::JumpIfFalse | Self::JumpIfTrue | Self::ForLoop | Self::SetupLoop | Self::SetupExcept
        )
    }

    /// Encoded size of the instruction in bytes.
    #[inline]
    #[must_use]
    pub fn width(self) -> usize {
        if self.has_argument() { 3 } else { 1 }
    }
}

/// Operand of `COMPARE_OP`.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display, EnumIter, serde::Serialize, serde::Deserialize,
)]
pub enum CompareOp {
    #[strum(serialize = "<")]
    Lt = 0,
    #[strum(serialize = "<=")]
    Le = 1,
    #[strum(serialize = "==")]
    Eq = 2,
    #[strum(serialize = "!=")]
    Ne = 3,
    #[strum(serialize = ">")]
    Gt = 4,
    #[strum(serialize = ">=")]
    Ge = 5,
    #[strum(serialize = "in")]
    In = 6,
    #[strum(serialize = "not in")]
    NotIn = 7,
    #[strum(serialize = "is")]
    Is = 8,
    #[strum(serialize = "is not")]
    IsNot = 9,
    #[strum(serialize = "exception match")]
    ExcMatch = 10,
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn encoding_round_trips_through_from_repr() {
        for op in Opcode::iter() {
            assert_eq!(Opcode::from_repr(op as u8), Some(op));
        }
        assert_eq!(Opcode::from_repr(0), None);
        assert_eq!(Opcode::from_repr(91), None);
    }

    #[test]
    fn argument_threshold() {
        assert!(!Opcode::BuildClass.has_argument());
        assert!(Opcode::StoreName.has_argument());
        assert_eq!(Opcode::SetLineno.width(), 3);
        assert_eq!(Opcode::PopTop.width(), 1);
    }

    #[test]
    fn names_match_the_wire_listing() {
        assert_eq!(Opcode::BinaryAdd.to_string(), "BINARY_ADD");
        assert_eq!(Opcode::Slice2.to_string(), "SLICE+2");
        assert_eq!(CompareOp::from_repr(7).map(|op| op.to_string()), Some("not in".to_owned()));
    }
}
