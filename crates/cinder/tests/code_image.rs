//! Tests for code images: postcard persistence, loading into the heap and
//! the disassembler.

use cinder::{CodeBuilder, CodeImage, CompareOp, Const, Interpreter, Object, Opcode, Runner, disassemble};
use pretty_assertions::assert_eq;

/// `def five(): return 5` followed by `return five() * 2`
fn program_with_function() -> CodeImage {
    let mut body = CodeBuilder::new("lib.py");
    body.load_const(5).emit(Opcode::ReturnValue);
    let mut b = CodeBuilder::new("main.py");
    b.load_const(body.build()).emit(Opcode::BuildFunction).emit(Opcode::UnaryCall);
    b.load_const(2).emit(Opcode::BinaryMultiply).emit(Opcode::ReturnValue);
    b.build()
}

// =============================================================================
// 1. Persistence
// =============================================================================

/// A dumped image loads back equal, nested code included, and still runs.
#[test]
fn dump_and_load() {
    let image = program_with_function();
    let bytes = image.dump().unwrap();
    let restored = CodeImage::load(&bytes).unwrap();
    assert_eq!(restored, image);
    assert!(matches!(&restored.consts[0], Const::Code(code) if code.filename == "lib.py"));
    assert_eq!(Runner::new(restored).run_no_limits().unwrap(), Object::Int(10));
}

/// Truncated or foreign bytes are rejected rather than producing a partial image.
#[test]
fn load_rejects_bad_bytes() {
    let bytes = program_with_function().dump().unwrap();
    assert!(CodeImage::load(&bytes[..bytes.len() / 2]).is_err());
    assert!(CodeImage::load(&[]).is_err());
}

/// The builder interns names and keeps constants in emission order.
#[test]
fn builder_tables() {
    let mut b = CodeBuilder::new("main.py");
    b.emit_name(Opcode::LoadName, "x").emit_name(Opcode::StoreName, "y");
    b.emit_name(Opcode::LoadName, "x");
    b.load_const("s").load_const(1.5).load_const(Const::None);
    let image = b.build();
    assert_eq!(image.names, vec!["x".to_owned(), "y".to_owned()]);
    assert_eq!(
        image.consts,
        vec![Const::Str("s".to_owned()), Const::Float(1.5), Const::None]
    );
    assert_eq!(&image.bytecode[..3], [Opcode::LoadName as u8, 0, 0]);
    assert_eq!(&image.bytecode[6..9], [Opcode::LoadName as u8, 0, 0]);
}

// =============================================================================
// 2. Loading
// =============================================================================

/// Loading materialises a code object the host can evaluate repeatedly.
#[test]
fn load_code_evaluates_twice() {
    let mut interp = Interpreter::new();
    let code = interp.load_code(&program_with_function()).unwrap();
    let globals = interp.new_dict().unwrap();
    for _ in 0..2 {
        let result = interp.eval(&code, &globals, &globals, None).unwrap();
        assert_eq!(interp.to_object(&result), Object::Int(10));
        interp.release(result);
    }
    interp.release(code);
    interp.release(globals);
}

// =============================================================================
// 3. Disassembly
// =============================================================================

/// Nested code is listed after the code that holds it.
#[test]
fn disassemble_nested_code() {
    assert_eq!(
        disassemble(&program_with_function()),
        "Disassembly of main.py:\n\
         \x20   0 LOAD_CONST           0 (<code lib.py>)\n\
         \x20   3 BUILD_FUNCTION\n\
         \x20   4 UNARY_CALL\n\
         \x20   5 LOAD_CONST           1 (2)\n\
         \x20   8 BINARY_MULTIPLY\n\
         \x20   9 RETURN_VALUE\n\
         \n\
         Disassembly of lib.py:\n\
         \x20   0 LOAD_CONST           0 (5)\n\
         \x20   3 RETURN_VALUE\n"
    );
}

/// Jumps show their absolute target and comparisons their operator.
#[test]
fn disassemble_operands() {
    let mut b = CodeBuilder::new("loop.py");
    let setup = b.emit_jump(Opcode::SetupLoop);
    b.emit_name(Opcode::LoadName, "x").load_const("abc");
    b.compare(CompareOp::NotIn);
    b.emit(Opcode::BreakLoop);
    b.patch_jump(setup);
    b.emit_jump_absolute(0);
    let text = disassemble(&b.build());
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[1], "    0 SETUP_LOOP          10 (to 13)");
    assert_eq!(lines[4], "    9 COMPARE_OP           7 (not in)");
    assert_eq!(lines[6], "   13 JUMP_ABSOLUTE        0 (to 0)");
    assert_eq!(lines[2], "    3 LOAD_NAME            0 (x)");
}
