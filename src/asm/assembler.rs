use crate::plat::OpcodeTable;

use super::{
    encoder::Encoder,
    lexer::lex_line,
    parser::parse_line,
    resolver::{resolve, Resolution},
    AsmError, EncodeError, Instruction, SourceError, Span,
};

/// Everything produced while assembling one source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compilation<'a> {
    /// One record per non-blank line, straight from the parser.
    pub parsed: Vec<Instruction<'a>>,
    /// Source line (0-based) of each record in `parsed`.
    pub lines: Vec<usize>,
    pub resolution: Resolution<'a>,
    /// The program image.
    pub bytes: Vec<u8>,
}

/// An assembly context capable of translating a source file into a program image.
///
/// Holds nothing but the instruction set, so one [Assembler] can be reused for any number of
/// sources.
#[derive(Debug, Clone, Copy)]
pub struct Assembler<'t> {
    opcodes: &'t OpcodeTable,
}

impl<'t> Assembler<'t> {
    pub fn new(opcodes: &'t OpcodeTable) -> Self {
        Self { opcodes }
    }

    /// Generates the program image for an assembly source.
    ///
    /// # Errors
    ///
    /// This function will return an error for the first problem found, located in the source.
    pub fn assemble(&self, source: &str) -> Result<Vec<u8>, SourceError> {
        Ok(self.compile(source)?.bytes)
    }

    /// Like [assemble](Self::assemble), but keeps every intermediate result.
    ///
    /// # Errors
    ///
    /// This function will return an error for the first problem found, located in the source.
    pub fn compile<'a>(&self, source: &'a str) -> Result<Compilation<'a>, SourceError> {
        let (parsed, lines) = parse_source(source)?;
        let locate = |e: EncodeError| locate_encode_error(e, &parsed, &lines);
        let resolution = resolve(&parsed).map_err(locate)?;
        let bytes = Encoder::new(self.opcodes)
            .encode(&resolution.program, &resolution.strings)
            .map_err(locate)?;
        log::info!(
            "assembled {} instructions from {} lines",
            parsed.len(),
            source.split('\n').count()
        );
        Ok(Compilation {
            parsed,
            lines,
            resolution,
            bytes,
        })
    }
}

/// Lexes and parses every line, returning the records and the line each came from.
///
/// # Errors
///
/// Stops at the first line that fails to lex or parse.
pub fn parse_source(source: &str) -> Result<(Vec<Instruction<'_>>, Vec<usize>), SourceError> {
    let mut parsed = vec![];
    let mut lines = vec![];
    for (line, text) in source.split('\n').enumerate() {
        let toks = lex_line(text).map_err(|e| SourceError {
            line,
            span: e.span,
            error: AsmError::Lex(e),
        })?;
        let instr = parse_line(toks).map_err(|e| SourceError {
            line,
            span: e.span,
            error: AsmError::Parse(e),
        })?;
        if let Some(instr) = instr {
            parsed.push(instr);
            lines.push(line);
        }
    }
    Ok((parsed, lines))
}

/// Finds the source position of an error raised after parsing, using the parsed records' spans.
fn locate_encode_error(e: EncodeError, parsed: &[Instruction<'_>], lines: &[usize]) -> SourceError {
    let span = parsed
        .get(e.instruction)
        .and_then(|instr| instr.offsets.get(e.slot))
        .copied()
        .unwrap_or_default();
    SourceError {
        line: lines.get(e.instruction).copied().unwrap_or_default(),
        span,
        error: AsmError::Encode(e),
    }
}
