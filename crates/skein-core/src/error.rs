//! Error types surfaced at the crate boundary.
//!
//! Every failure in the core is a returned [`SyntaxError`]; nothing panics on
//! malformed input and nothing is reported out-of-band. The first error halts
//! the parse in progress and the partially built AST is discarded.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminant for the failure classes the core can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A scanning failure: unterminated string/command/option, bad escape,
    /// or an unknown character inside `<<...>>`.
    LexError,
    /// A structural failure while consuming the token stream.
    ParseError,
    /// A dedent landed on a width that was never pushed.
    IndentMismatch,
    /// A `(` without `)` or a `)` without `(` in an expression.
    UnbalancedParens,
    /// The parser found a token outside the expected set.
    UnexpectedToken,
    /// An expression position held no expression tokens at all.
    EmptyExpression,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::LexError => "lex error",
            ErrorKind::ParseError => "parse error",
            ErrorKind::IndentMismatch => "indent mismatch",
            ErrorKind::UnbalancedParens => "unbalanced parentheses",
            ErrorKind::UnexpectedToken => "unexpected token",
            ErrorKind::EmptyExpression => "empty expression",
        };
        f.write_str(name)
    }
}

/// A lexing or parsing failure, positioned in the source text.
///
/// `line` and `column` are 1-based and point at the offending character or
/// token. The rendered form is a single line: `Line L:C: <detail>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("Line {line}:{column}: {message}")]
pub struct SyntaxError {
    pub kind: ErrorKind,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl SyntaxError {
    pub fn new(kind: ErrorKind, line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            column,
            message: message.into(),
        }
    }
}
