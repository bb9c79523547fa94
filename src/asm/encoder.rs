//! Serializes a resolved program into the image the virtual machine loads.
//!
//! All integers are little-endian. The image is:
//!
//! ```text
//! string table:  count (8)  record*
//!   record:      len (8)  bytes  NUL padding (1..=8, up to a multiple of 8)  -1 (8)
//! instructions:  count (8)  instruction*
//!   instruction: opcode (6)  flags (1)  argc (1)  arg (8) x 3
//! ```
//!
//! The first string record is always the empty string. The flags byte holds the register
//! bitmap in its high nibble and the string bitmap in its low nibble; unused argument words
//! are zero.

use crate::plat::{
    ArgFlags, OpcodeTable, ARGS_OFFSET, INSTRUCTION_BYTES, OPCODE_BYTES, STRING_SENTINEL,
    WORD_BYTES,
};

use super::{resolver::StringTable, EncodeError, EncodeErrorKind, Instruction, Value};

fn push_record(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(bytes);
    let pad = WORD_BYTES - bytes.len() % WORD_BYTES;
    out.resize(out.len() + pad, 0);
    out.extend_from_slice(&STRING_SENTINEL.to_le_bytes());
}

/// Serializes the string literal table, empty string first.
pub fn encode_string_table(strings: &StringTable) -> Vec<u8> {
    let mut out = vec![];
    out.extend_from_slice(&(strings.len() as u64).to_le_bytes());
    push_record(&mut out, &[]);
    for lit in strings.literals() {
        push_record(&mut out, lit);
    }
    out
}

/// Turns resolved instruction records into machine code, checking each against an [OpcodeTable].
#[derive(Debug, Clone, Copy)]
pub struct Encoder<'t> {
    opcodes: &'t OpcodeTable,
}

impl<'t> Encoder<'t> {
    pub fn new(opcodes: &'t OpcodeTable) -> Self {
        Self { opcodes }
    }

    /// Encodes the instruction at position `index` of the program.
    ///
    /// # Errors
    ///
    /// This function will return an error if the mnemonic is not in the opcode table, or if the
    /// instruction has the wrong number of arguments for it.
    pub fn encode_instruction(
        &self,
        index: usize,
        instr: &Instruction<'_, Value>,
    ) -> Result<[u8; INSTRUCTION_BYTES], EncodeError> {
        let at_mnemonic = |kind| EncodeError {
            kind,
            instruction: index,
            slot: instr.mnemonic_slot(),
        };
        let def = self
            .opcodes
            .get(instr.mnemonic)
            .ok_or_else(|| at_mnemonic(EncodeErrorKind::NonexistentMnemonic))?;
        if instr.args.len() != def.arity {
            return Err(at_mnemonic(EncodeErrorKind::WrongArgCount {
                need: def.arity,
                given: instr.args.len(),
            }));
        }

        let mut out = [0u8; INSTRUCTION_BYTES];
        let mut registers = ArgFlags::empty();
        let mut strings = ArgFlags::empty();
        for (j, arg) in instr.args.iter().enumerate() {
            let word = match arg.item {
                Value::Integer(n) => n.to_le_bytes(),
                Value::Register(n) => {
                    registers |= ArgFlags::slot(j);
                    n.to_le_bytes()
                }
                Value::String(n) => {
                    strings |= ArgFlags::slot(j);
                    n.to_le_bytes()
                }
            };
            let at = ARGS_OFFSET + j * WORD_BYTES;
            out[at..at + WORD_BYTES].copy_from_slice(&word);
        }
        out[..OPCODE_BYTES].copy_from_slice(&def.code_bytes());
        out[OPCODE_BYTES] = ArgFlags::pack(registers, strings);
        out[OPCODE_BYTES + 1] = instr.args.len() as u8;
        Ok(out)
    }

    /// Encodes the instruction section: the instruction count, then every instruction in order.
    ///
    /// # Errors
    ///
    /// Returns the error of the first instruction that cannot be encoded.
    pub fn encode_program(&self, program: &[Instruction<'_, Value>]) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::with_capacity(WORD_BYTES + program.len() * INSTRUCTION_BYTES);
        out.extend_from_slice(&(program.len() as u64).to_le_bytes());
        for (i, instr) in program.iter().enumerate() {
            out.extend_from_slice(&self.encode_instruction(i, instr)?);
        }
        Ok(out)
    }

    /// Builds the complete program image: string table, then instructions.
    ///
    /// # Errors
    ///
    /// Returns the error of the first instruction that cannot be encoded.
    pub fn encode(
        &self,
        program: &[Instruction<'_, Value>],
        strings: &StringTable,
    ) -> Result<Vec<u8>, EncodeError> {
        let mut out = encode_string_table(strings);
        out.extend(self.encode_program(program)?);
        log::debug!(
            "encoded {} instructions and {} strings into {} bytes",
            program.len(),
            strings.len(),
            out.len()
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::asm::{Span, WithSpan};

    fn instr<'a>(label: Option<&'a str>, mnemonic: &'a str, args: &[Value]) -> Instruction<'a, Value> {
        Instruction {
            label,
            mnemonic,
            args: args
                .iter()
                .map(|&item| WithSpan {
                    span: Span::default(),
                    item,
                })
                .collect(),
            offsets: vec![],
        }
    }

    fn word(n: i64) -> Vec<u8> {
        n.to_le_bytes().to_vec()
    }

    #[test]
    fn test_empty_string_table() {
        let bytes = encode_string_table(&StringTable::default());
        assert_eq!(bytes, [word(1), word(0), word(0), word(-1)].concat());
    }

    #[test]
    fn test_string_records() {
        let mut strings = StringTable::default();
        strings.push(b"aAb".to_vec());
        strings.push(b"12345678".to_vec());
        let bytes = encode_string_table(&strings);
        let expected = [
            word(3),
            word(0),
            word(0),
            word(-1),
            word(3),
            b"aAb\0\0\0\0\0".to_vec(),
            word(-1),
            word(8),
            b"12345678".to_vec(),
            word(0),
            word(-1),
        ]
        .concat();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_encode_instruction() {
        let table = OpcodeTable::builtin().unwrap();
        let enc = Encoder::new(&table);
        let bytes = enc
            .encode_instruction(0, &instr(None, "ins", &[Value::Register(3), Value::String(2)]))
            .unwrap();
        let expected = [
            vec![14, 0, 0, 0, 0, 0, 0b0001_0010, 2],
            word(3),
            word(2),
            word(0),
        ]
        .concat();
        assert_eq!(bytes.to_vec(), expected);

        let bytes = enc
            .encode_instruction(0, &instr(None, "put", &[Value::Integer(-2)]))
            .unwrap();
        assert_eq!(bytes[6], 0);
        assert_eq!(bytes[7], 1);
        assert_eq!(bytes[8..16].to_vec(), word(-2));
    }

    #[test]
    fn test_fixed_width() {
        let table = OpcodeTable::builtin().unwrap();
        let enc = Encoder::new(&table);
        let program = [
            instr(None, "neg", &[]),
            instr(None, "jmp", &[Value::Integer(1)]),
            instr(None, "st", &[Value::Register(1), Value::Integer(0)]),
        ];
        let bytes = enc.encode_program(&program).unwrap();
        assert_eq!(bytes.len(), WORD_BYTES + 3 * INSTRUCTION_BYTES);
        assert_eq!(bytes[..8].to_vec(), word(3));
        // `neg` takes no arguments but still carries three zero words
        assert_eq!(bytes[8..14].to_vec(), vec![9, 0, 0, 0, 0, 0]);
        assert_eq!(bytes[14..40].to_vec(), vec![0u8; 26]);
    }

    #[test]
    fn test_nonexistent_mnemonic() {
        let table = OpcodeTable::builtin().unwrap();
        let program = [
            instr(None, "nop", &[]),
            instr(
                Some("x"),
                "foo",
                &[Value::Register(1), Value::Register(2), Value::Register(3)],
            ),
        ];
        assert_eq!(
            Encoder::new(&table).encode_program(&program).unwrap_err(),
            EncodeError {
                kind: EncodeErrorKind::NonexistentMnemonic,
                instruction: 1,
                slot: 1,
            }
        );
    }

    #[test]
    fn test_wrong_arg_count() {
        let table = OpcodeTable::builtin().unwrap();
        let err = Encoder::new(&table)
            .encode_instruction(4, &instr(None, "put", &[]))
            .unwrap_err();
        assert_eq!(
            err,
            EncodeError {
                kind: EncodeErrorKind::WrongArgCount { need: 1, given: 0 },
                instruction: 4,
                slot: 0,
            }
        );
        assert_eq!(err.to_string(), "wrong number of arguments (need 1, 0 given)");
    }

    #[test]
    fn test_encode_is_deterministic() {
        let table = OpcodeTable::builtin().unwrap();
        let enc = Encoder::new(&table);
        let mut strings = StringTable::default();
        strings.push(b"hello".to_vec());
        let program = [instr(None, "cat", &[Value::String(1)]), instr(None, "len", &[])];
        let first = enc.encode(&program, &strings).unwrap();
        let second = enc.encode(&program, &strings).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 8 + 24 + 24 + 8 + 2 * 32);
    }
}
