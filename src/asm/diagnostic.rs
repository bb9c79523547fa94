//! Human-readable rendering of [SourceError]s.

use std::fmt;

use super::SourceError;

/// A [SourceError] together with the source it refers to, ready to be printed.
///
/// ```text
/// prog.s:3:4: error: nonexistent mnemonic
///  3 | !x foo $1 $2 $3
///    |    ^^^
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Diagnostic<'a> {
    error: &'a SourceError,
    name: &'a str,
    source: &'a str,
}

impl SourceError {
    /// Pairs this error with the source text it was raised for. `name` is how the source is
    /// referred to in the output, usually its path.
    pub fn diagnostic<'a>(&'a self, name: &'a str, source: &'a str) -> Diagnostic<'a> {
        Diagnostic {
            error: self,
            name,
            source,
        }
    }
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = self
            .source
            .split('\n')
            .nth(self.error.line)
            .unwrap_or_default()
            .trim_end_matches('\r');
        let line_num = (self.error.line + 1).to_string();
        let span = self.error.span;

        writeln!(
            f,
            "{}:{}:{}: error: {}",
            self.name,
            line_num,
            span.start + 1,
            self.error.error
        )?;
        writeln!(f, " {line_num} | {line}")?;
        // keep tabs so the carets line up with the source
        let indent: String = line
            .chars()
            .chain(std::iter::repeat(' '))
            .take(span.start)
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        write!(
            f,
            " {:width$} | {indent}{}",
            "",
            "^".repeat(span.len().max(1)),
            width = line_num.len()
        )
    }
}
