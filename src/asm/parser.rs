//! Turns the tokens of one line into an [Instruction] record.

use super::{Instruction, Operand, ParseError, ParseErrorKind, Span, Token, WithSpan};

/// Mnemonic given to a line that holds nothing but a label.
pub const IMPLIED_MNEMONIC: &str = "nop";

/// Parses one line's tokens.
///
/// Returns `None` for a line without tokens. Arguments are taken as they come; checking
/// their number is left to the encoder.
///
/// # Errors
///
/// This function will return an error if the line has tokens but no mnemonic where one is due.
pub fn parse_line(toks: Vec<WithSpan<Token<'_>>>) -> Result<Option<Instruction<'_>>, ParseError> {
    let mut toks = toks.into_iter();
    let Some(first) = toks.next() else {
        return Ok(None);
    };

    let mut offsets = vec![];
    let (label, head) = match first {
        WithSpan {
            item: Token::Label(name),
            span,
        } => {
            offsets.push(span);
            (Some(name), toks.next())
        }
        tok => (None, Some(tok)),
    };

    let mnemonic = match head {
        Some(WithSpan {
            item: Token::Name(name),
            span,
        }) => {
            offsets.push(span);
            name
        }
        Some(tok) => {
            return Err(ParseError {
                kind: ParseErrorKind::MissingMnemonic,
                slot: offsets.len(),
                span: tok.span,
            })
        }
        // only a label on this line
        None => {
            let at = offsets.last().map_or(0, |span| span.end);
            offsets.push(Span::point(at));
            IMPLIED_MNEMONIC
        }
    };

    let mut args = vec![];
    for tok in toks {
        offsets.push(tok.span);
        args.push(WithSpan {
            span: tok.span,
            item: Operand::from(tok.item),
        });
    }

    log::trace!("parsed {mnemonic} with {} args", args.len());
    Ok(Some(Instruction {
        label,
        mnemonic,
        args,
        offsets,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::lexer::lex_line;

    fn parse(line: &str) -> Result<Option<Instruction<'_>>, ParseError> {
        parse_line(lex_line(line).unwrap())
    }

    #[test]
    fn test_parse_line() {
        let instr = parse("!loop put $0 #5").unwrap().unwrap();
        assert_eq!(instr.label, Some("loop"));
        assert_eq!(instr.mnemonic, "put");
        let args: Vec<_> = instr.args.iter().map(|a| a.item.clone()).collect();
        assert_eq!(args, vec![Operand::Register("0"), Operand::Integer("5")]);
        assert_eq!(
            instr.offsets,
            vec![Span::new(0, 5), Span::new(6, 9), Span::new(10, 12), Span::new(13, 15)]
        );
        assert_eq!(instr.mnemonic_slot(), 1);
        assert_eq!(instr.arg_slot(1), 3);
    }

    #[test]
    fn test_unlabelled() {
        let instr = parse("jb !loop /").unwrap().unwrap();
        assert_eq!(instr.label, None);
        assert_eq!(instr.mnemonic_slot(), 0);
        assert_eq!(instr.args[0].item, Operand::Label("loop"));
        assert_eq!(instr.args[1].item, Operand::Empty);
        assert_eq!(instr.offsets.len(), 3);
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("    ").unwrap(), None);
    }

    #[test]
    fn test_label_only() {
        let instr = parse("!entry").unwrap().unwrap();
        assert_eq!(instr.label, Some("entry"));
        assert_eq!(instr.mnemonic, "nop");
        assert!(instr.args.is_empty());
        assert_eq!(instr.offsets, vec![Span::new(0, 6), Span::point(6)]);
    }

    #[test]
    fn test_arity_not_checked() {
        let instr = parse("neg #1 #2 #3 #4").unwrap().unwrap();
        assert_eq!(instr.args.len(), 4);
    }

    #[test]
    fn test_missing_mnemonic() {
        assert_eq!(
            parse("!start #5"),
            Err(ParseError {
                kind: ParseErrorKind::MissingMnemonic,
                slot: 1,
                span: Span::new(7, 9),
            })
        );
        assert_eq!(
            parse("$1 put"),
            Err(ParseError {
                kind: ParseErrorKind::MissingMnemonic,
                slot: 0,
                span: Span::new(0, 2),
            })
        );
    }
}
