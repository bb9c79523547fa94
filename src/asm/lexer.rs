//! Splits one line of assembly into [Token]s.
//!
//! The first character of a token decides its kind:
//!
//! | start        | token                |
//! |--------------|----------------------|
//! | `a`..`z`     | [Token::Name]        |
//! | `!`          | [Token::Label]       |
//! | `#`          | [Token::Integer]     |
//! | `"`          | [Token::String]      |
//! | `$`          | [Token::Register]    |
//! | `/`          | [Token::Empty]        |
//!
//! A bad character inside a token is only reported once the token ends, so the error span
//! always covers the whole token.

use super::{LexError, LexErrorKind, Span, Token, WithSpan};

/// Byte value of the character following a backslash, for everything except `\x`.
pub fn escape_code(c: char) -> Option<u8> {
    match c {
        'a' => Some(7),
        'b' => Some(8),
        'e' => Some(27),
        'f' => Some(12),
        'n' => Some(10),
        'r' => Some(13),
        't' => Some(9),
        'v' => Some(11),
        '\\' => Some(b'\\'),
        '"' => Some(b'"'),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrState {
    Plain,
    Escape,
    /// After `\x`; holds the first hex character once seen.
    Hex(Option<char>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Label,
    Name,
    Integer,
    Register,
    Empty,
    String(StrState),
}

struct Lexer<'a> {
    line: &'a str,
    toks: Vec<WithSpan<Token<'a>>>,
    state: State,
    /// Character and byte index of the current token's first character.
    start: (usize, usize),
    /// Decoded bytes of the current string token.
    buf: Vec<u8>,
    /// First problem found in the current token, reported when it ends.
    pending: Option<LexErrorKind>,
}

impl<'a> Lexer<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            line,
            toks: vec![],
            state: State::Idle,
            start: (0, 0),
            buf: vec![],
            pending: None,
        }
    }

    fn defer(&mut self, kind: LexErrorKind) {
        self.pending.get_or_insert(kind);
    }

    fn begin(&mut self, i: usize, byte: usize, c: char) -> Result<(), LexError> {
        self.start = (i, byte);
        self.state = match c {
            '!' => State::Label,
            '#' => State::Integer,
            '$' => State::Register,
            '/' => State::Empty,
            '"' => State::String(StrState::Plain),
            c if c.is_ascii_lowercase() => State::Name,
            _ => {
                return Err(LexError {
                    kind: LexErrorKind::MalformedToken,
                    span: Span::new(i, i + 1),
                })
            }
        };
        Ok(())
    }

    /// Ends the current token. `end` is the character index just past it, `end_byte` the
    /// matching byte index of the token text's end.
    fn finish(&mut self, end: usize, end_byte: usize) -> Result<(), LexError> {
        let line = self.line;
        let span = Span::new(self.start.0, end);
        let state = std::mem::replace(&mut self.state, State::Idle);
        if state == State::Idle {
            return Ok(());
        }
        if let Some(kind) = self.pending.take() {
            return Err(LexError { kind, span });
        }
        // everything after the sigil
        let body = &line[self.start.1 + 1..end_byte];
        let item = match state {
            State::Idle => return Ok(()),
            State::Name => Token::Name(&line[self.start.1..end_byte]),
            State::Label if body.is_empty() => {
                return Err(LexError {
                    kind: LexErrorKind::MalformedLabel,
                    span,
                })
            }
            State::Label => Token::Label(body),
            State::Integer if body.is_empty() || body == "-" => {
                return Err(LexError {
                    kind: LexErrorKind::MalformedInteger,
                    span,
                })
            }
            State::Integer => Token::Integer(body),
            State::Register if body.is_empty() => {
                return Err(LexError {
                    kind: LexErrorKind::MalformedRegister,
                    span,
                })
            }
            State::Register => Token::Register(body),
            State::Empty => Token::Empty,
            State::String(_) => Token::String(std::mem::take(&mut self.buf)),
        };
        log::trace!("token {:?} at {}..{}", item, span.start, span.end);
        self.toks.push(WithSpan { span, item });
        Ok(())
    }

    fn string_char(&mut self, st: StrState, i: usize, byte: usize, c: char) -> Result<(), LexError> {
        let next = match st {
            StrState::Plain => match c {
                '\\' => StrState::Escape,
                '"' => return self.finish(i + 1, byte),
                c => {
                    let mut utf8 = [0u8; 4];
                    self.buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                    StrState::Plain
                }
            },
            StrState::Escape if c == 'x' => StrState::Hex(None),
            StrState::Escape => {
                match escape_code(c) {
                    Some(b) => self.buf.push(b),
                    None => self.defer(LexErrorKind::MalformedEscape),
                }
                StrState::Plain
            }
            StrState::Hex(None) => StrState::Hex(Some(c)),
            StrState::Hex(Some(hi)) => {
                match (hi.to_digit(16), c.to_digit(16)) {
                    (Some(hi), Some(lo)) => self.buf.push((hi * 16 + lo) as u8),
                    _ => self.defer(LexErrorKind::MalformedHexcode),
                }
                StrState::Plain
            }
        };
        self.state = State::String(next);
        Ok(())
    }

    fn step(&mut self, i: usize, byte: usize, c: char) -> Result<(), LexError> {
        match self.state {
            State::String(st) => return self.string_char(st, i, byte, c),
            State::Idle if c.is_whitespace() => {}
            State::Idle => return self.begin(i, byte, c),
            _ if c.is_whitespace() => return self.finish(i, byte),
            State::Label if !c.is_ascii_lowercase() => self.defer(LexErrorKind::MalformedLabel),
            State::Name if !c.is_ascii_lowercase() => self.defer(LexErrorKind::MalformedMnemonic),
            State::Integer => {
                let first = byte == self.start.1 + 1;
                if !(c.is_ascii_digit() || (c == '-' && first)) {
                    self.defer(LexErrorKind::MalformedInteger);
                }
            }
            State::Register if !c.is_ascii_digit() => self.defer(LexErrorKind::MalformedRegister),
            State::Empty => self.defer(LexErrorKind::MalformedEmpty),
            State::Label | State::Name | State::Register => {}
        }
        Ok(())
    }

    fn run(mut self) -> Result<Vec<WithSpan<Token<'a>>>, LexError> {
        let mut len = 0;
        for (i, (byte, c)) in self.line.char_indices().enumerate() {
            self.step(i, byte, c)?;
            len = i + 1;
        }
        match self.state {
            State::Idle => {}
            State::String(_) => {
                return Err(LexError {
                    kind: LexErrorKind::IncompleteInput,
                    span: Span::point(len),
                })
            }
            _ => self.finish(len, self.line.len())?,
        }
        Ok(self.toks)
    }
}

/// Lexes one line of assembly into its tokens, in order.
///
/// # Errors
///
/// This function will return an error for the first token that cannot be lexed.
pub fn lex_line(line: &str) -> Result<Vec<WithSpan<Token<'_>>>, LexError> {
    Lexer::new(line).run()
}
