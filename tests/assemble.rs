use magicc::{
    asm::{AsmError, Assembler, EncodeErrorKind, Operand, Value},
    plat::{OpcodeTable, INSTRUCTION_BYTES},
};
use pretty_assertions::assert_eq;

fn word(n: i64) -> Vec<u8> {
    n.to_le_bytes().to_vec()
}

const EMPTY_TABLE: usize = 8 + 24;

#[test]
fn readme_program() {
    let source = r#"!loop put $0
      sub #1
      jb !done
      jmp !loop
!done cat "bye\n"
"#;
    let opcodes = OpcodeTable::builtin().unwrap();
    let bin = Assembler::new(&opcodes).assemble(source).unwrap();

    let mut expected = [word(2), word(0), word(0), word(-1)].concat();
    expected.extend([word(4), b"bye\n\0\0\0\0".to_vec(), word(-1)].concat());
    expected.extend(word(5));
    // put $0
    expected.extend([vec![0, 0, 0, 0, 0, 0, 0x10, 1], word(0), word(0), word(0)].concat());
    // sub #1
    expected.extend([vec![8, 0, 0, 0, 0, 0, 0, 1], word(1), word(0), word(0)].concat());
    // jb !done
    expected.extend([vec![23, 0, 0, 0, 0, 0, 0, 1], word(5), word(0), word(0)].concat());
    // jmp !loop
    expected.extend([vec![22, 0, 0, 0, 0, 0, 0, 1], word(1), word(0), word(0)].concat());
    // cat "bye\n"
    expected.extend([vec![15, 0, 0, 0, 0, 0, 0x01, 1], word(1), word(0), word(0)].concat());
    assert_eq!(bin, expected);
}

#[test]
fn instruction_count_matches_lines() {
    let source = "neg\n\n   \nlen\nnop\n!end\n";
    let opcodes = OpcodeTable::builtin().unwrap();
    let bin = Assembler::new(&opcodes).assemble(source).unwrap();
    assert_eq!(bin[EMPTY_TABLE..EMPTY_TABLE + 8].to_vec(), word(4));
    assert_eq!(bin.len(), EMPTY_TABLE + 8 + 4 * INSTRUCTION_BYTES);
}

#[test]
fn hex_escape_literal() {
    let opcodes = OpcodeTable::builtin().unwrap();
    let comp = Assembler::new(&opcodes)
        .compile(r#"put "a\x41b""#)
        .unwrap();
    assert_eq!(comp.resolution.strings.literals(), &[b"aAb".to_vec()]);
    assert_eq!(
        comp.bytes[..EMPTY_TABLE + 24].to_vec(),
        [
            word(2),
            word(0),
            word(0),
            word(-1),
            word(3),
            b"aAb\0\0\0\0\0".to_vec(),
            word(-1)
        ]
        .concat()
    );
}

#[test]
fn empty_and_literal_indices() {
    let opcodes = OpcodeTable::builtin().unwrap();
    let comp = Assembler::new(&opcodes)
        .compile("cat /\ncat \"x\"\ncat /\ncat \"x\"")
        .unwrap();
    let indices: Vec<_> = comp
        .resolution
        .program
        .iter()
        .map(|i| i.args[0].item)
        .collect();
    assert_eq!(
        indices,
        vec![
            Value::String(0),
            Value::String(1),
            Value::String(0),
            Value::String(2)
        ]
    );
    assert_eq!(comp.resolution.strings.len(), 3);
}

#[test]
fn label_only_line() {
    let opcodes = OpcodeTable::builtin().unwrap();
    let comp = Assembler::new(&opcodes).compile("!entry\njmp !entry").unwrap();
    let first = &comp.parsed[0];
    assert_eq!(first.label, Some("entry"));
    assert_eq!(first.mnemonic, "nop");
    assert!(first.args.is_empty());
    assert_eq!(comp.parsed[1].args[0].item, Operand::Label("entry"));
    assert_eq!(comp.resolution.program[1].args[0].item, Value::Integer(1));
}

#[test]
fn unknown_mnemonic() {
    let opcodes = OpcodeTable::builtin().unwrap();
    let err = Assembler::new(&opcodes)
        .assemble("nop\nfoo $1 $2 $3")
        .unwrap_err();
    match err.error {
        AsmError::Encode(e) => {
            assert_eq!(e.kind, EncodeErrorKind::NonexistentMnemonic);
            assert_eq!(e.instruction, 1);
            assert_eq!(e.slot, 0);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.line, 1);
    assert_eq!((err.span.start, err.span.end), (0, 3));
}

#[test]
fn reusable_assembler() {
    let opcodes = OpcodeTable::builtin().unwrap();
    let asm = Assembler::new(&opcodes);
    let source = "!a put #7\nje !a\nst $1 $2";
    assert_eq!(asm.assemble(source).unwrap(), asm.assemble(source).unwrap());
}
