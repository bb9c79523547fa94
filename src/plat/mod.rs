//! Common platform code: the instruction set and binary layout of the magick virtual machine.

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use thiserror::Error;

pub mod defs;

/// Width of an opcode in an encoded instruction.
pub const OPCODE_BYTES: usize = 6;
/// Width of every integer word in the program image.
pub const WORD_BYTES: usize = 8;
/// Number of argument words every encoded instruction carries, used or not.
pub const ARG_SLOTS: usize = 3;
/// Offset of the first argument word within an encoded instruction.
pub const ARGS_OFFSET: usize = OPCODE_BYTES + 2;
/// Size of one encoded instruction.
pub const INSTRUCTION_BYTES: usize = ARGS_OFFSET + ARG_SLOTS * WORD_BYTES;
/// Largest opcode that fits in [OPCODE_BYTES].
pub const MAX_OPCODE: u64 = (1 << (OPCODE_BYTES * 8)) - 1;
/// Marks the end of a string literal record.
pub const STRING_SENTINEL: i64 = -1;

/// The instruction set the virtual machine is built with.
pub const BUILTIN_DEFINITIONS: &str = include_str!("instruction_opcodes.h");

/// An error while loading an instruction set definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("line {line}: malformed opcode definition")]
    Malformed { line: u32 },
    #[error("line {line}: opcode {code} does not fit in {} bytes", OPCODE_BYTES)]
    CodeTooLarge { line: u32, code: u64 },
    #[error("line {line}: {arity} arguments requested, but only {} slots exist", ARG_SLOTS)]
    ArityTooLarge { line: u32, arity: u64 },
    #[error("line {line}: `{name}` is defined twice")]
    Duplicate { line: u32, name: String },
}

/// Type alias for Result<T, [DefinitionError]>.
pub type DResult<T> = Result<T, DefinitionError>;

/// What the assembler knows about one mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpcodeDef {
    /// Numeric opcode, at most [MAX_OPCODE].
    pub code: u64,
    /// Exact number of arguments the instruction takes.
    pub arity: usize,
}

impl OpcodeDef {
    /// The opcode as it appears at the start of an encoded instruction.
    pub fn code_bytes(self) -> [u8; OPCODE_BYTES] {
        let mut out = [0u8; OPCODE_BYTES];
        out.copy_from_slice(&self.code.to_le_bytes()[..OPCODE_BYTES]);
        out
    }
}

/// Mapping from lowercase mnemonic to its [OpcodeDef].
///
/// Built once, then only ever read. The [Assembler](crate::asm::Assembler) borrows it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpcodeTable {
    ops: FxHashMap<String, OpcodeDef>,
}

impl OpcodeTable {
    /// Loads the instruction set shipped with the crate ([BUILTIN_DEFINITIONS]).
    ///
    /// # Errors
    ///
    /// Only if the embedded definition file itself is malformed.
    pub fn builtin() -> DResult<Self> {
        Self::from_definitions(BUILTIN_DEFINITIONS)
    }

    /// Loads an instruction set from definition text in the `#define INSTR_<NAME> <CODE> // <ARITY>` format.
    ///
    /// # Errors
    ///
    /// This function will return an error naming the first line that is not a valid definition.
    pub fn from_definitions(text: &str) -> DResult<Self> {
        let mut ops = FxHashMap::default();
        for def in defs::parse_definitions(text)? {
            let name = def.name.to_ascii_lowercase();
            if ops.contains_key(&name) {
                return Err(DefinitionError::Duplicate {
                    line: def.line,
                    name,
                });
            }
            ops.insert(
                name,
                OpcodeDef {
                    code: def.code,
                    arity: def.arity,
                },
            );
        }
        log::debug!("loaded {} opcode definitions", ops.len());
        Ok(Self { ops })
    }

    pub fn get(&self, mnemonic: &str) -> Option<OpcodeDef> {
        self.ops.get(mnemonic).copied()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

bitflags! {
    /// One bit per argument slot of an instruction.
    ///
    /// Two of these make up the flags byte of an encoded instruction: the register bitmap in the
    /// high nibble, the string bitmap in the low nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ArgFlags: u8 {
        const SLOT0 = 1 << 0;
        const SLOT1 = 1 << 1;
        const SLOT2 = 1 << 2;
        const SLOT3 = 1 << 3;
    }
}

impl ArgFlags {
    /// The flag for argument `index`. Indices past the fourth slot have no flag.
    pub fn slot(index: usize) -> Self {
        match index {
            0 => Self::SLOT0,
            1 => Self::SLOT1,
            2 => Self::SLOT2,
            3 => Self::SLOT3,
            _ => Self::empty(),
        }
    }

    /// Packs a register bitmap and a string bitmap into the instruction flags byte.
    pub fn pack(registers: Self, strings: Self) -> u8 {
        (registers.bits() << 4) | strings.bits()
    }
}
