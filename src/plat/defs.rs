//! Reader for instruction set definition files.
//!
//! The virtual machine's opcode header doubles as the assembler's opcode table. Each
//! instruction is one line of the form:
//!
//! ```text
//! #define INSTR_<NAME>	<CODE>	// <ARITY>
//! ```
//!
//! Lines that do not start with `#` are skipped.

use nom::{
    bytes::complete::{tag, take_while1},
    character::complete::{digit1, line_ending, not_line_ending, space0, space1},
    combinator::{all_consuming, map_res, opt},
    sequence::{pair, preceded, terminated, tuple},
    Finish, IResult,
};
use nom_locate::LocatedSpan;

use super::{DResult, DefinitionError, ARG_SLOTS, MAX_OPCODE};

pub type Span<'a> = LocatedSpan<&'a str>;

/// One `#define` line, checked against the platform limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Definition<'a> {
    /// 1-based line number in the definition text.
    pub line: u32,
    /// The name as written, without the `INSTR_` prefix.
    pub name: &'a str,
    pub code: u64,
    pub arity: usize,
}

pub fn lex_number(inp: Span) -> IResult<Span, u64> {
    map_res(digit1, |x: Span| x.fragment().parse::<u64>())(inp)
}

pub fn lex_name(inp: Span) -> IResult<Span, Span> {
    preceded(tag("INSTR_"), take_while1(|c: char| c.is_ascii_uppercase()))(inp)
}

pub fn lex_define(inp: Span) -> IResult<Span, (Span, u64, u64)> {
    all_consuming(tuple((
        preceded(pair(tag("#define"), space1), lex_name),
        preceded(space1, lex_number),
        terminated(
            preceded(tuple((space0, tag("//"), space0)), lex_number),
            space0,
        ),
    )))(inp)
}

pub fn lex_line(inp: Span) -> IResult<Span, Span> {
    terminated(not_line_ending, opt(line_ending))(inp)
}

/// Reads every `#define` line out of `text`, in file order.
///
/// # Errors
///
/// This function will return an error for the first `#` line that is not a well-formed
/// definition, or whose code or arity does not fit the platform.
pub fn parse_definitions(text: &str) -> DResult<Vec<Definition<'_>>> {
    let mut rest = Span::new(text);
    let mut out = vec![];
    while !rest.fragment().is_empty() {
        let line = rest.location_line();
        let (next, content) = lex_line(rest)
            .finish()
            .map_err(|_| DefinitionError::Malformed { line })?;
        rest = next;

        if !content.fragment().starts_with('#') {
            continue;
        }
        let (_, (name, code, arity)) = lex_define(content)
            .finish()
            .map_err(|_| DefinitionError::Malformed { line })?;
        if code > MAX_OPCODE {
            return Err(DefinitionError::CodeTooLarge { line, code });
        }
        if arity > ARG_SLOTS as u64 {
            return Err(DefinitionError::ArityTooLarge { line, arity });
        }
        log::trace!("INSTR_{} = {code} ({arity} args)", name.fragment());
        out.push(Definition {
            line,
            name: name.fragment(),
            code,
            arity: arity as usize,
        });
    }
    Ok(out)
}
