//! Human-readable bytecode listings.

use std::fmt::Write;

use super::{
    image::{CodeImage, Const},
    op::{CompareOp, Opcode},
};

/// Renders one instruction per line: offset, opcode name, operand and what the
/// operand resolves to. Nested code constants are listed after the outer code.
///
/// Bytes that are not opcodes and truncated operands are shown inline rather
/// than aborting the listing.
#[must_use]
pub fn disassemble(image: &CodeImage) -> String {
    let mut out = String::new();
    disassemble_into(image, &mut out);
    out
}

fn disassemble_into(image: &CodeImage, out: &mut String) {
    let _ = writeln!(out, "Disassembly of {}:", image.filename);
    let bytes = &image.bytecode;
    let mut ip = 0;
    while ip < bytes.len() {
        let offset = ip;
        let byte = bytes[ip];
        ip += 1;
        let Some(op) = Opcode::from_repr(byte) else {
            let _ = writeln!(out, "{offset:>5} <unknown opcode {byte}>");
            continue;
        };
        let name: &'static str = op.into();
        if !op.has_argument() {
            let _ = writeln!(out, "{offset:>5} {name}");
            continue;
        }
        let Some(operand) = bytes.get(ip..ip + 2) else {
            let _ = writeln!(out, "{offset:>5} {name:<16} <truncated operand>");
            break;
        };
        let arg = u16::from_le_bytes([operand[0], operand[1]]);
        ip += 2;
        match resolve(image, op, arg, ip) {
            Some(detail) => {
                let _ = writeln!(out, "{offset:>5} {name:<16} {arg:>5} ({detail})");
            }
            None => {
                let _ = writeln!(out, "{offset:>5} {name:<16} {arg:>5}");
            }
        }
    }

    for constant in &image.consts {
        if let Const::Code(code) = constant {
            out.push('\n');
            disassemble_into(code, out);
        }
    }
}

fn resolve(image: &CodeImage, op: Opcode, arg: u16, next: usize) -> Option<String> {
    let index = usize::from(arg);
    match op {
        Opcode::LoadConst => Some(image.consts.get(index).map_or_else(|| "?".to_owned(), const_repr)),
        Opcode::StoreName
        | Opcode::LoadName
        | Opcode::LoadAttr
        | Opcode::StoreAttr
        | Opcode::ImportName
        | Opcode::ImportFrom => Some(image.names.get(index).cloned().unwrap_or_else(|| "?".to_owned())),
        Opcode::CompareOp => Some(
            u8::try_from(arg)
                .ok()
                .and_then(CompareOp::from_repr)
                .map_or_else(|| "?".to_owned(), |cmp| cmp.to_string()),
        ),
        Opcode::JumpAbsolute => Some(format!("to {index}")),
        op if op.is_relative_jump() => Some(format!("to {}", next + index)),
        _ => None,
    }
}

fn const_repr(constant: &Const) -> String {
    match constant {
        Const::None => "None".to_owned(),
        Const::Int(i) => i.to_string(),
        Const::Float(f) => format!("{f:?}"),
        Const::Str(s) => format!("'{s}'"),
        Const::Code(code) => format!("<code {}>", code.filename),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bytecode::CodeBuilder;

    #[test]
    fn listing_resolves_operands() {
        let mut builder = CodeBuilder::new("main.py");
        builder.load_const(2).emit_name(Opcode::StoreName, "x");
        let done = builder.emit_jump(Opcode::JumpForward);
        builder.emit(Opcode::PopTop);
        builder.patch_jump(done);
        builder.compare(CompareOp::Le).emit_raw(0);
        let text = disassemble(&builder.build());
        assert_eq!(
            text,
            "Disassembly of main.py:\n    0 LOAD_CONST           0 (2)\n    3 STORE_NAME           0 (x)\n    6 JUMP_FORWARD         1 (to 10)\n    9 POP_TOP\n   10 COMPARE_OP           1 (<=)\n   13 <unknown opcode 0>\n"
        );
    }
}
