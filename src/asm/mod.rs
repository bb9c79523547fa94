//! The assembler module: turns magick assembly into a program image for the virtual machine.
//!
//! Source is handled one line at a time by the [lexer] and [parser], then the whole program
//! goes through the [resolver] passes and finally the [encoder]. The [Assembler] drives all
//! of it and maps any error back onto the source text.

use thiserror::Error;

pub mod assembler;
pub mod diagnostic;
pub mod encoder;
pub mod lexer;
pub mod parser;
pub mod resolver;

pub use assembler::{Assembler, Compilation};

/// A half-open range of character indices within a single source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// An empty span sitting at `at`.
    pub fn point(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn len(self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

/// Something read from the source, together with where it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WithSpan<T> {
    pub span: Span,
    pub item: T,
}

/// An assembly language token. Output for the lexer, input for the parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token<'a> {
    /// `!name`. Defines a label at the start of a line, references one anywhere else.
    Label(&'a str),
    /// A bare lowercase word, i.e. a mnemonic.
    Name(&'a str),
    /// `#digits`, optionally negative. Holds the text after the `#`.
    Integer(&'a str),
    /// `"text"`, with escapes already decoded.
    String(Vec<u8>),
    /// `$digits`, a stack slot. Holds the text after the `$`.
    Register(&'a str),
    /// `/`, an argument with no value.
    Empty,
}

/// A fully resolved argument, as it will be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    /// Encoded as a signed word. Resolved labels end up here too.
    Integer(i64),
    /// Index into the string literal table; 0 is the empty string.
    String(u64),
    /// Stack slot number.
    Register(u64),
}

/// An instruction argument at some point between parsing and encoding.
///
/// The parser produces the raw forms; each [resolver] pass replaces the forms it is
/// responsible for with [Operand::Value].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand<'a> {
    Label(&'a str),
    Name(&'a str),
    Integer(&'a str),
    String(Vec<u8>),
    Register(&'a str),
    Empty,
    Value(Value),
}

impl<'a> From<Token<'a>> for Operand<'a> {
    fn from(tok: Token<'a>) -> Self {
        match tok {
            Token::Label(name) => Self::Label(name),
            Token::Name(name) => Self::Name(name),
            Token::Integer(digits) => Self::Integer(digits),
            Token::String(bytes) => Self::String(bytes),
            Token::Register(digits) => Self::Register(digits),
            Token::Empty => Self::Empty,
        }
    }
}

/// One instruction record, produced from one non-blank source line.
///
/// `A` is the argument representation: [Operand] until resolution is finished, [Value] after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction<'a, A = Operand<'a>> {
    /// The label defined on this line, if any.
    pub label: Option<&'a str>,
    pub mnemonic: &'a str,
    pub args: Vec<WithSpan<A>>,
    /// Spans of the label (if present), the mnemonic, then each argument.
    pub offsets: Vec<Span>,
}

impl<'a, A> Instruction<'a, A> {
    /// Index into [offsets](Self::offsets) of the mnemonic.
    pub fn mnemonic_slot(&self) -> usize {
        usize::from(self.label.is_some())
    }

    /// Index into [offsets](Self::offsets) of argument `arg`.
    pub fn arg_slot(&self, arg: usize) -> usize {
        self.mnemonic_slot() + 1 + arg
    }

    /// Copies this record, rewriting every argument through `f`. Spans are kept as they are.
    ///
    /// # Errors
    ///
    /// Stops at, and returns, the first error `f` produces.
    pub fn try_map_args<B, E>(
        &self,
        mut f: impl FnMut(usize, &A) -> Result<B, E>,
    ) -> Result<Instruction<'a, B>, E> {
        let args = self
            .args
            .iter()
            .enumerate()
            .map(|(j, arg)| -> Result<WithSpan<B>, E> {
                Ok(WithSpan {
                    span: arg.span,
                    item: f(j, &arg.item)?,
                })
            })
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Instruction {
            label: self.label,
            mnemonic: self.mnemonic,
            args,
            offsets: self.offsets.clone(),
        })
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    #[error("malformed token")]
    MalformedToken,
    #[error("malformed label")]
    MalformedLabel,
    #[error("malformed mnemonic")]
    MalformedMnemonic,
    #[error("malformed integer")]
    MalformedInteger,
    #[error("malformed register")]
    MalformedRegister,
    #[error("empty symbol not followed by whitespace")]
    MalformedEmpty,
    #[error("malformed escape code")]
    MalformedEscape,
    #[error("malformed hexcode")]
    MalformedHexcode,
    #[error("incomplete input")]
    IncompleteInput,
}

/// A line that could not be split into tokens.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{kind}")]
pub struct LexError {
    pub kind: LexErrorKind,
    /// The offending token, or the end of the line for [LexErrorKind::IncompleteInput].
    pub span: Span,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("missing mnemonic")]
    MissingMnemonic,
}

/// A line whose tokens do not form an instruction.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Index of the offending token within the line.
    pub slot: usize,
    pub span: Span,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    #[error("nonexistent mnemonic")]
    NonexistentMnemonic,
    #[error("wrong number of arguments (need {need}, {given} given)")]
    WrongArgCount { need: usize, given: usize },
    #[error("nonexistent label")]
    NonexistentLabel,
    #[error("integer literal out of range")]
    IntegerOutOfRange,
    #[error("register number out of range")]
    RegisterOutOfRange,
    #[error("unexpected name in argument list")]
    UnexpectedName,
}

/// A program that could not be resolved or encoded.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{kind}")]
pub struct EncodeError {
    pub kind: EncodeErrorKind,
    /// Index of the instruction record.
    pub instruction: usize,
    /// Index into that record's [offsets](Instruction::offsets).
    pub slot: usize,
}

/// Any error raised by the assembly pipeline.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AsmError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// An [AsmError] pinned to a place in the source text.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("line {}: {error}", .line + 1)]
pub struct SourceError {
    /// 0-based source line.
    pub line: usize,
    /// Character span within that line.
    pub span: Span,
    pub error: AsmError,
}
