//! Replaces symbolic and textual arguments with concrete values.
//!
//! Resolution is a fixed sequence of passes over the whole program, each producing a new
//! generation of records and leaving its input untouched:
//!
//! 1. [resolve_labels]: label references become instruction addresses.
//! 2. [resolve_strings]: string literals become string table indices, and so do empty markers
//!    (always index 0).
//! 3. [resolve_integers]: integer literal text is parsed.
//! 4. [resolve_registers]: register number text is parsed.
//!
//! [finish] then narrows the records to [Value] arguments, which is what the encoder accepts.

use rustc_hash::FxHashMap;

use super::{EncodeError, EncodeErrorKind, Instruction, Operand, Value};

/// Label name to address. Addresses count instructions from 1.
pub type LabelTable<'a> = FxHashMap<&'a str, u64>;

/// String literals in the order they appear in the program.
///
/// Index 0 is reserved for the empty string and never stored; literal `n` (from 0) has index
/// `n + 1`. Equal literals are not merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTable {
    literals: Vec<Vec<u8>>,
}

impl StringTable {
    /// Index of the empty string.
    pub const EMPTY: u64 = 0;

    /// Appends a literal and returns its index.
    pub fn push(&mut self, bytes: Vec<u8>) -> u64 {
        self.literals.push(bytes);
        self.literals.len() as u64
    }

    pub fn get(&self, index: u64) -> Option<&[u8]> {
        match index {
            Self::EMPTY => Some(b"".as_slice()),
            n => self
                .literals
                .get(usize::try_from(n - 1).ok()?)
                .map(Vec::as_slice),
        }
    }

    /// Literals in index order, not counting the empty string.
    pub fn literals(&self) -> &[Vec<u8>] {
        &self.literals
    }

    /// Number of records, counting the empty string.
    pub fn len(&self) -> usize {
        self.literals.len() + 1
    }

    /// Always false; the empty string is always present.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Every generation of the program produced during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub labels: LabelTable<'a>,
    pub strings: StringTable,
    pub after_labels: Vec<Instruction<'a>>,
    pub after_strings: Vec<Instruction<'a>>,
    pub after_integers: Vec<Instruction<'a>>,
    pub after_registers: Vec<Instruction<'a>>,
    /// The final, fully resolved program.
    pub program: Vec<Instruction<'a, Value>>,
}

fn error(kind: EncodeErrorKind, program: &[Instruction<'_>], i: usize, arg: usize) -> EncodeError {
    EncodeError {
        kind,
        instruction: i,
        slot: program[i].arg_slot(arg),
    }
}

/// Copies the program, passing every argument through `f`.
fn rewrite<'a, B>(
    program: &[Instruction<'a>],
    mut f: impl FnMut(&Operand<'a>) -> Result<B, EncodeErrorKind>,
) -> Result<Vec<Instruction<'a, B>>, EncodeError> {
    program
        .iter()
        .enumerate()
        .map(|(i, instr)| {
            instr
                .try_map_args(|j, arg| f(arg).map_err(|kind| (j, kind)))
                .map_err(|(j, kind)| error(kind, program, i, j))
        })
        .collect()
}

/// Builds the label table. A label defined twice takes the address of its last definition.
pub fn label_table<'a>(program: &[Instruction<'a>]) -> LabelTable<'a> {
    let mut labels = LabelTable::default();
    for (i, instr) in program.iter().enumerate() {
        if let Some(name) = instr.label {
            if let Some(old) = labels.insert(name, i as u64 + 1) {
                log::debug!("label `{name}` redefined, was {old}, now {}", i + 1);
            }
        }
    }
    labels
}

/// Replaces every label reference with the address of the instruction it labels, as an integer.
///
/// # Errors
///
/// Fails with [EncodeErrorKind::NonexistentLabel] on a reference to a label that is never defined.
pub fn resolve_labels<'a>(
    program: &[Instruction<'a>],
) -> Result<(Vec<Instruction<'a>>, LabelTable<'a>), EncodeError> {
    let labels = label_table(program);
    let out = rewrite(program, |arg| match arg {
        Operand::Label(name) => labels
            .get(name)
            .map(|&addr| Operand::Value(Value::Integer(addr as i64)))
            .ok_or(EncodeErrorKind::NonexistentLabel),
        arg => Ok(arg.clone()),
    })?;
    log::debug!("resolved {} labels", labels.len());
    Ok((out, labels))
}

/// Moves every string literal into a fresh [StringTable], replacing it with its index.
/// Empty markers become the empty string.
pub fn resolve_strings<'a>(program: &[Instruction<'a>]) -> (Vec<Instruction<'a>>, StringTable) {
    let mut strings = StringTable::default();
    let out = program
        .iter()
        .map(|instr| {
            let mut instr = instr.clone();
            for arg in instr.args.iter_mut() {
                match &mut arg.item {
                    Operand::String(bytes) => {
                        let index = strings.push(std::mem::take(bytes));
                        arg.item = Operand::Value(Value::String(index));
                    }
                    Operand::Empty => arg.item = Operand::Value(Value::String(StringTable::EMPTY)),
                    _ => {}
                }
            }
            instr
        })
        .collect();
    log::debug!("collected {} string literals", strings.literals().len());
    (out, strings)
}

/// Parses every integer literal.
///
/// # Errors
///
/// Fails with [EncodeErrorKind::IntegerOutOfRange] on a literal that does not fit in an `i64`.
pub fn resolve_integers<'a>(program: &[Instruction<'a>]) -> Result<Vec<Instruction<'a>>, EncodeError> {
    rewrite(program, |arg| match arg {
        Operand::Integer(digits) => digits
            .parse::<i64>()
            .map(|n| Operand::Value(Value::Integer(n)))
            .map_err(|_| EncodeErrorKind::IntegerOutOfRange),
        arg => Ok(arg.clone()),
    })
}

/// Parses every register number.
///
/// # Errors
///
/// Fails with [EncodeErrorKind::RegisterOutOfRange] on a number that does not fit in a `u64`.
pub fn resolve_registers<'a>(program: &[Instruction<'a>]) -> Result<Vec<Instruction<'a>>, EncodeError> {
    rewrite(program, |arg| match arg {
        Operand::Register(digits) => digits
            .parse::<u64>()
            .map(|n| Operand::Value(Value::Register(n)))
            .map_err(|_| EncodeErrorKind::RegisterOutOfRange),
        arg => Ok(arg.clone()),
    })
}

/// Narrows fully resolved records to [Value] arguments.
///
/// # Errors
///
/// Fails with [EncodeErrorKind::UnexpectedName] if an argument is still symbolic, which can
/// only be a bare name written where an argument belongs.
pub fn finish<'a>(program: &[Instruction<'a>]) -> Result<Vec<Instruction<'a, Value>>, EncodeError> {
    rewrite(program, |arg| match arg {
        Operand::Value(value) => Ok(*value),
        _ => Err(EncodeErrorKind::UnexpectedName),
    })
}

/// Runs every pass, in order.
///
/// # Errors
///
/// Returns the first error any pass raises.
pub fn resolve<'a>(parsed: &[Instruction<'a>]) -> Result<Resolution<'a>, EncodeError> {
    let (after_labels, labels) = resolve_labels(parsed)?;
    let (after_strings, strings) = resolve_strings(&after_labels);
    let after_integers = resolve_integers(&after_strings)?;
    let after_registers = resolve_registers(&after_integers)?;
    let program = finish(&after_registers)?;
    Ok(Resolution {
        labels,
        strings,
        after_labels,
        after_strings,
        after_integers,
        after_registers,
        program,
    })
}
