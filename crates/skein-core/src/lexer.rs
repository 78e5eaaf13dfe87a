//! Lexer for Skein dialogue scripts.
//!
//! A script mixes three sub-grammars in one file: free-form dialogue lines,
//! commands delimited by `<<...>>`, and link options delimited by `[[...]]`,
//! organized by significant whitespace. The lexer is a mode-stacked state
//! machine rather than a regular tokenizer: `<<` in text mode pushes command
//! mode, `[[` pushes option mode, and the matching closer pops back.
//!
//! Indentation is tracked with a stack of widths seeded with 0. Each
//! non-blank line emits `Indent`/`Dedent` tokens as its leading whitespace
//! grows or shrinks; a dedent that lands between two recorded widths is an
//! error. Tabs count as one column. Blank lines and comment-only lines
//! produce no tokens and no indentation events.
//!
//! A dialogue `Text` token ends at end-of-line, at the next `<<`, at the
//! next `[[`, or at a `//` comment. Commands and options must close on the
//! line that opened them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SyntaxError};

/// The closed set of token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // ── Structural ─────────────────────────────────────────────────
    /// Leading whitespace grew: a block opens.
    Indent,
    /// Leading whitespace shrank back to an enclosing width.
    Dedent,
    /// End of the token stream; emitted exactly once, last.
    EndOfInput,

    // ── Command delimiters ─────────────────────────────────────────
    /// `<<`
    BeginCommand,
    /// `>>`
    EndCommand,

    // ── Option delimiters ──────────────────────────────────────────
    /// `[[`
    OptionStart,
    /// `|`
    OptionDelimit,
    /// `]]`
    OptionEnd,

    // ── Keywords ───────────────────────────────────────────────────
    If,
    ElseIf,
    Else,
    EndIf,
    Set,

    // ── Operators ──────────────────────────────────────────────────
    /// `+`
    Add,
    /// `-` (binary; unary minus is resolved by the expression parser)
    Minus,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `==`, `is`, `eq`
    EqualTo,
    /// `!=`, `neq`
    NotEqualTo,
    /// `<`, `lt`
    LessThan,
    /// `<=`, `lte`
    LessThanOrEqual,
    /// `>`, `gt`
    GreaterThan,
    /// `>=`, `gte`
    GreaterThanOrEqual,
    /// `&&`, `and`
    And,
    /// `||`, `or`
    Or,
    /// `^`, `xor`
    Xor,
    /// `!`, `not`
    Not,
    /// `=`, `to`
    EqualToOrAssign,
    /// `+=`
    AddAssign,
    /// `-=`
    MinusAssign,
    /// `*=`
    MultiplyAssign,
    /// `/=`
    DivideAssign,

    // ── Literals ───────────────────────────────────────────────────
    /// A numeric literal, kept as its textual form.
    Number,
    /// A double-quoted string literal, escapes resolved.
    Str,
    /// A `$`-prefixed variable; the value keeps the `$`.
    Variable,
    True,
    False,
    Null,

    // ── Identifiers ────────────────────────────────────────────────
    /// A bare identifier.
    Identifier,
    /// An identifier immediately followed by `(`: a function callee.
    Function,

    // ── Dialogue ───────────────────────────────────────────────────
    /// A run of free-form text (dialogue, option label, command body).
    Text,

    // ── Punctuation ────────────────────────────────────────────────
    LeftParen,
    RightParen,
    Comma,
    /// `->` at the start of a line.
    ShortcutOption,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Indent => "indent",
            TokenKind::Dedent => "dedent",
            TokenKind::EndOfInput => "end of input",
            TokenKind::BeginCommand => "'<<'",
            TokenKind::EndCommand => "'>>'",
            TokenKind::OptionStart => "'[['",
            TokenKind::OptionDelimit => "'|'",
            TokenKind::OptionEnd => "']]'",
            TokenKind::If => "'if'",
            TokenKind::ElseIf => "'elseif'",
            TokenKind::Else => "'else'",
            TokenKind::EndIf => "'endif'",
            TokenKind::Set => "'set'",
            TokenKind::Add => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Multiply => "'*'",
            TokenKind::Divide => "'/'",
            TokenKind::EqualTo => "'=='",
            TokenKind::NotEqualTo => "'!='",
            TokenKind::LessThan => "'<'",
            TokenKind::LessThanOrEqual => "'<='",
            TokenKind::GreaterThan => "'>'",
            TokenKind::GreaterThanOrEqual => "'>='",
            TokenKind::And => "'&&'",
            TokenKind::Or => "'||'",
            TokenKind::Xor => "'^'",
            TokenKind::Not => "'!'",
            TokenKind::EqualToOrAssign => "'='",
            TokenKind::AddAssign => "'+='",
            TokenKind::MinusAssign => "'-='",
            TokenKind::MultiplyAssign => "'*='",
            TokenKind::DivideAssign => "'/='",
            TokenKind::Number => "number",
            TokenKind::Str => "string",
            TokenKind::Variable => "variable",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Null => "'null'",
            TokenKind::Identifier => "identifier",
            TokenKind::Function => "function name",
            TokenKind::Text => "text",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::Comma => "','",
            TokenKind::ShortcutOption => "'->'",
        };
        f.write_str(name)
    }
}

/// A single token with its 1-based source position.
///
/// `value` is present for the kinds that carry text: `Number`, `Str`,
/// `Variable`, `Identifier`, `Function`, and `Text`. Token equality is by
/// kind and value only; positions are ignored.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.value == other.value
    }
}

impl Token {
    /// The carried text, or `""` for kinds without one.
    pub fn text(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

/// Tokenize a source string.
///
/// The result always ends with exactly one `EndOfInput` token, preceded by
/// a `Dedent` for every indentation level still open. `\r\n` line endings
/// are normalized to `\n`.
pub fn lex(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new().run(source)
}

/// Scanning mode. The base mode is `Text`; `<<` and `[[` push the other two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    /// Inside a structured `<<...>>` command; `start_col` is the column of
    /// the opening `<<` for unterminated-command errors.
    Command { start_col: u32 },
    /// Inside a `[[...]]` option; `delimited` is set once `|` was seen.
    Option { start_col: u32, delimited: bool },
}

/// Command keywords that switch the command interior to expression lexing.
/// Anything else after `<<` is a custom command and stays raw text.
const STRUCTURED_COMMANDS: &[&str] = &["if", "elseif", "else", "endif", "set"];

struct Lexer {
    tokens: Vec<Token>,
    /// Indentation widths, seeded with 0.
    indents: Vec<u32>,
    /// Pushed non-text modes; empty means `Mode::Text`.
    modes: Vec<Mode>,
    /// Characters of the line being scanned.
    chars: Vec<char>,
    pos: usize,
    line: u32,
}

impl Lexer {
    fn new() -> Self {
        Self {
            tokens: Vec::new(),
            indents: vec![0],
            modes: Vec::new(),
            chars: Vec::new(),
            pos: 0,
            line: 0,
        }
    }

    fn run(mut self, source: &str) -> Result<Vec<Token>, SyntaxError> {
        for (idx, raw) in source.split('\n').enumerate() {
            self.line = idx as u32 + 1;
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            self.chars.clear();
            self.chars.extend(line.chars());
            self.pos = 0;
            self.scan_line()?;
        }
        let eof_col = self.chars.len() as u32 + 1;
        self.line = self.line.max(1);
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, None, eof_col);
        }
        self.push(TokenKind::EndOfInput, None, eof_col);
        Ok(self.tokens)
    }

    // ── Character helpers ──────────────────────────────────────────

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn ch(&self) -> char {
        self.chars.get(self.pos).copied().unwrap_or('\0')
    }

    fn ch_at(&self, offset: usize) -> char {
        self.chars.get(self.pos + offset).copied().unwrap_or('\0')
    }

    fn pair(&self, a: char, b: char) -> bool {
        self.ch() == a && self.ch_at(1) == b
    }

    fn skip_whitespace(&mut self) {
        while !self.at_end() && matches!(self.ch(), ' ' | '\t') {
            self.pos += 1;
        }
    }

    /// Current 1-based column.
    fn column(&self) -> u32 {
        self.pos as u32 + 1
    }

    fn push(&mut self, kind: TokenKind, value: Option<String>, column: u32) {
        self.tokens.push(Token {
            kind,
            value,
            line: self.line,
            column,
        });
    }

    fn error(&self, kind: ErrorKind, column: u32, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(kind, self.line, column, message)
    }

    fn mode(&self) -> Mode {
        self.modes.last().copied().unwrap_or(Mode::Text)
    }

    // ── Line scanning ──────────────────────────────────────────────

    fn scan_line(&mut self) -> Result<(), SyntaxError> {
        while !self.at_end() && matches!(self.ch(), ' ' | '\t') {
            self.pos += 1;
        }
        // Blank and comment-only lines produce no tokens and no
        // indentation events.
        if self.at_end() || self.pair('/', '/') {
            return Ok(());
        }

        self.apply_indent(self.pos as u32)?;

        // `->` is a shortcut-option marker only at the start of a line;
        // anywhere else it is ordinary dialogue text.
        if self.pair('-', '>') {
            self.push(TokenKind::ShortcutOption, None, self.column());
            self.pos += 2;
        }

        let mut run_start: Option<usize> = None;
        loop {
            match self.mode() {
                Mode::Text => {
                    if self.at_end() {
                        self.flush_text(run_start.take());
                        return Ok(());
                    }
                    if self.pair('<', '<') {
                        self.flush_text(run_start.take());
                        let start_col = self.column();
                        self.push(TokenKind::BeginCommand, None, start_col);
                        self.pos += 2;
                        self.begin_command(start_col)?;
                    } else if self.pair('[', '[') {
                        self.flush_text(run_start.take());
                        let start_col = self.column();
                        self.push(TokenKind::OptionStart, None, start_col);
                        self.pos += 2;
                        self.modes.push(Mode::Option {
                            start_col,
                            delimited: false,
                        });
                    } else if self.pair('/', '/') {
                        self.flush_text(run_start.take());
                        return Ok(());
                    } else {
                        if run_start.is_none() {
                            run_start = Some(self.pos);
                        }
                        self.pos += 1;
                    }
                }
                Mode::Command { start_col } => {
                    self.skip_whitespace();
                    if self.pair('/', '/') {
                        self.pos = self.chars.len();
                    }
                    if self.at_end() {
                        return Err(self.error(
                            ErrorKind::LexError,
                            start_col,
                            "unterminated command: expected '>>' before end of line",
                        ));
                    }
                    if self.pair('>', '>') {
                        self.push(TokenKind::EndCommand, None, self.column());
                        self.pos += 2;
                        self.modes.pop();
                    } else {
                        self.scan_expression_token()?;
                    }
                }
                Mode::Option {
                    start_col,
                    delimited,
                } => {
                    self.scan_option_run(start_col, delimited)?;
                }
            }
        }
    }

    /// Compare a line's leading width against the indent stack, emitting
    /// `Indent`/`Dedent` tokens.
    fn apply_indent(&mut self, width: u32) -> Result<(), SyntaxError> {
        let top = self.indents.last().copied().unwrap_or(0);
        if width > top {
            self.indents.push(width);
            self.push(TokenKind::Indent, None, 1);
        } else if width < top {
            while self.indents.last().copied().unwrap_or(0) > width {
                self.indents.pop();
                self.push(TokenKind::Dedent, None, 1);
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(self.error(
                    ErrorKind::IndentMismatch,
                    width + 1,
                    "dedent does not match any enclosing indentation level",
                ));
            }
        }
        Ok(())
    }

    /// Emit a trimmed `Text` token for the run ending at the current
    /// position; empty results are suppressed.
    fn flush_text(&mut self, run_start: Option<usize>) {
        let Some(start) = run_start else { return };
        let run: String = self.chars[start..self.pos].iter().collect();
        let trimmed = run.trim();
        if trimmed.is_empty() {
            return;
        }
        let leading = run.chars().take_while(|c| c.is_whitespace()).count();
        let column = (start + leading) as u32 + 1;
        self.push(TokenKind::Text, Some(trimmed.to_string()), column);
    }

    // ── Command interior ───────────────────────────────────────────

    /// Decide how to lex a command interior. Structured keywords switch to
    /// expression lexing; anything else is one raw `Text` token up to `>>`.
    fn begin_command(&mut self, start_col: u32) -> Result<(), SyntaxError> {
        let mut p = self.pos;
        while p < self.chars.len() && matches!(self.chars[p], ' ' | '\t') {
            p += 1;
        }
        let word_start = p;
        while p < self.chars.len() && is_ident_continue(self.chars[p]) {
            p += 1;
        }
        let word: String = self.chars[word_start..p].iter().collect();
        if STRUCTURED_COMMANDS.contains(&word.as_str()) {
            self.modes.push(Mode::Command { start_col });
            return Ok(());
        }
        self.scan_raw_command(start_col)
    }

    /// Consume a custom command interior up to `>>` as one `Text` token.
    fn scan_raw_command(&mut self, start_col: u32) -> Result<(), SyntaxError> {
        let start = self.pos;
        while !self.at_end() {
            if self.pair('>', '>') {
                let run: String = self.chars[start..self.pos].iter().collect();
                let trimmed = run.trim();
                if !trimmed.is_empty() {
                    let leading = run.chars().take_while(|c| c.is_whitespace()).count();
                    self.push(
                        TokenKind::Text,
                        Some(trimmed.to_string()),
                        (start + leading) as u32 + 1,
                    );
                }
                self.push(TokenKind::EndCommand, None, self.column());
                self.pos += 2;
                return Ok(());
            }
            if self.pair('/', '/') {
                break;
            }
            self.pos += 1;
        }
        Err(self.error(
            ErrorKind::LexError,
            start_col,
            "unterminated command: expected '>>' before end of line",
        ))
    }

    /// Lex one token of the expression sub-grammar inside `<<...>>`.
    fn scan_expression_token(&mut self) -> Result<(), SyntaxError> {
        let col = self.column();
        let c = self.ch();
        match c {
            '"' => self.scan_string(),
            '$' => self.scan_variable(),
            '0'..='9' => {
                self.scan_number();
                Ok(())
            }
            '-' if self.ch_at(1).is_ascii_digit() && self.at_operand_position() => {
                self.scan_number();
                Ok(())
            }
            '-' if self.ch_at(1) == '=' => {
                self.pos += 2;
                self.push(TokenKind::MinusAssign, None, col);
                Ok(())
            }
            '-' => {
                self.pos += 1;
                self.push(TokenKind::Minus, None, col);
                Ok(())
            }
            '+' if self.ch_at(1) == '=' => {
                self.pos += 2;
                self.push(TokenKind::AddAssign, None, col);
                Ok(())
            }
            '+' => {
                self.pos += 1;
                self.push(TokenKind::Add, None, col);
                Ok(())
            }
            '*' if self.ch_at(1) == '=' => {
                self.pos += 2;
                self.push(TokenKind::MultiplyAssign, None, col);
                Ok(())
            }
            '*' => {
                self.pos += 1;
                self.push(TokenKind::Multiply, None, col);
                Ok(())
            }
            '/' if self.ch_at(1) == '=' => {
                self.pos += 2;
                self.push(TokenKind::DivideAssign, None, col);
                Ok(())
            }
            '/' => {
                self.pos += 1;
                self.push(TokenKind::Divide, None, col);
                Ok(())
            }
            '=' if self.ch_at(1) == '=' => {
                self.pos += 2;
                self.push(TokenKind::EqualTo, None, col);
                Ok(())
            }
            '=' => {
                self.pos += 1;
                self.push(TokenKind::EqualToOrAssign, None, col);
                Ok(())
            }
            '!' if self.ch_at(1) == '=' => {
                self.pos += 2;
                self.push(TokenKind::NotEqualTo, None, col);
                Ok(())
            }
            '!' => {
                self.pos += 1;
                self.push(TokenKind::Not, None, col);
                Ok(())
            }
            '<' if self.ch_at(1) == '=' => {
                self.pos += 2;
                self.push(TokenKind::LessThanOrEqual, None, col);
                Ok(())
            }
            '<' => {
                self.pos += 1;
                self.push(TokenKind::LessThan, None, col);
                Ok(())
            }
            // `>>` was already claimed as the command closer.
            '>' if self.ch_at(1) == '=' => {
                self.pos += 2;
                self.push(TokenKind::GreaterThanOrEqual, None, col);
                Ok(())
            }
            '>' => {
                self.pos += 1;
                self.push(TokenKind::GreaterThan, None, col);
                Ok(())
            }
            '&' if self.ch_at(1) == '&' => {
                self.pos += 2;
                self.push(TokenKind::And, None, col);
                Ok(())
            }
            '|' if self.ch_at(1) == '|' => {
                self.pos += 2;
                self.push(TokenKind::Or, None, col);
                Ok(())
            }
            '^' => {
                self.pos += 1;
                self.push(TokenKind::Xor, None, col);
                Ok(())
            }
            '(' => {
                self.pos += 1;
                self.push(TokenKind::LeftParen, None, col);
                Ok(())
            }
            ')' => {
                self.pos += 1;
                self.push(TokenKind::RightParen, None, col);
                Ok(())
            }
            ',' => {
                self.pos += 1;
                self.push(TokenKind::Comma, None, col);
                Ok(())
            }
            _ if is_ident_start(c) => {
                self.scan_word();
                Ok(())
            }
            _ => Err(self.error(
                ErrorKind::LexError,
                col,
                format!("unknown character {c:?} in command"),
            )),
        }
    }

    /// True when the previous token cannot end an operand, so a following
    /// `-` belongs to a numeric literal rather than a subtraction.
    fn at_operand_position(&self) -> bool {
        !matches!(
            self.tokens.last().map(|t| t.kind),
            Some(
                TokenKind::Number
                    | TokenKind::Str
                    | TokenKind::Variable
                    | TokenKind::True
                    | TokenKind::False
                    | TokenKind::Null
                    | TokenKind::Identifier
                    | TokenKind::RightParen
            )
        )
    }

    fn scan_string(&mut self) -> Result<(), SyntaxError> {
        let start_col = self.column();
        self.pos += 1; // opening quote
        let mut s = String::new();
        while !self.at_end() {
            let c = self.ch();
            match c {
                '"' => {
                    self.pos += 1;
                    self.push(TokenKind::Str, Some(s), start_col);
                    return Ok(());
                }
                '\\' => {
                    let esc = self.ch_at(1);
                    match esc {
                        '"' | '\\' => {
                            s.push(esc);
                            self.pos += 2;
                        }
                        '\0' => break,
                        _ => {
                            return Err(self.error(
                                ErrorKind::LexError,
                                self.column(),
                                format!("invalid escape sequence '\\{esc}' in string"),
                            ));
                        }
                    }
                }
                _ => {
                    s.push(c);
                    self.pos += 1;
                }
            }
        }
        Err(self.error(ErrorKind::LexError, start_col, "unterminated string"))
    }

    fn scan_variable(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        let col = self.column();
        self.pos += 1; // `$`
        if self.at_end() || !is_ident_start(self.ch()) {
            return Err(self.error(ErrorKind::LexError, col, "expected a name after '$'"));
        }
        while !self.at_end() && is_ident_continue(self.ch()) {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        self.push(TokenKind::Variable, Some(name), col);
        Ok(())
    }

    fn scan_number(&mut self) {
        let start = self.pos;
        let col = self.column();
        if self.ch() == '-' {
            self.pos += 1;
        }
        while !self.at_end() && self.ch().is_ascii_digit() {
            self.pos += 1;
        }
        if self.ch() == '.' && self.ch_at(1).is_ascii_digit() {
            self.pos += 1;
            while !self.at_end() && self.ch().is_ascii_digit() {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.push(TokenKind::Number, Some(text), col);
    }

    /// Scan a keyword, word operator, literal word, or identifier.
    fn scan_word(&mut self) {
        let start = self.pos;
        let col = self.column();
        while !self.at_end() && is_ident_continue(self.ch()) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        let kind = match word.as_str() {
            "if" => TokenKind::If,
            "elseif" => TokenKind::ElseIf,
            "else" => TokenKind::Else,
            "endif" => TokenKind::EndIf,
            "set" => TokenKind::Set,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "xor" => TokenKind::Xor,
            "not" => TokenKind::Not,
            "is" | "eq" => TokenKind::EqualTo,
            "neq" => TokenKind::NotEqualTo,
            "lt" => TokenKind::LessThan,
            "lte" => TokenKind::LessThanOrEqual,
            "gt" => TokenKind::GreaterThan,
            "gte" => TokenKind::GreaterThanOrEqual,
            "to" => TokenKind::EqualToOrAssign,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => {
                // An identifier directly followed by `(` is a callee.
                let kind = if self.ch() == '(' {
                    TokenKind::Function
                } else {
                    TokenKind::Identifier
                };
                self.push(kind, Some(word), col);
                return;
            }
        };
        self.push(kind, None, col);
    }

    // ── Option interior ────────────────────────────────────────────

    /// Scan one text run inside `[[...]]`, ending at `|` (first run only),
    /// `]]`, or end of line.
    fn scan_option_run(&mut self, start_col: u32, delimited: bool) -> Result<(), SyntaxError> {
        let run_start = self.pos;
        loop {
            if self.at_end() || self.pair('/', '/') {
                return Err(self.error(
                    ErrorKind::LexError,
                    start_col,
                    "unterminated option: expected ']]' before end of line",
                ));
            }
            if self.pair(']', ']') || (!delimited && self.ch() == '|') {
                break;
            }
            self.pos += 1;
        }

        let run: String = self.chars[run_start..self.pos].iter().collect();
        let trimmed = run.trim();
        if !trimmed.is_empty() {
            let leading = run.chars().take_while(|c| c.is_whitespace()).count();
            self.push(
                TokenKind::Text,
                Some(trimmed.to_string()),
                (run_start + leading) as u32 + 1,
            );
        }

        if self.ch() == '|' && !delimited {
            self.push(TokenKind::OptionDelimit, None, self.column());
            self.pos += 1;
            self.modes.pop();
            self.modes.push(Mode::Option {
                start_col,
                delimited: true,
            });
        } else {
            self.push(TokenKind::OptionEnd, None, self.column());
            self.pos += 2;
            self.modes.pop();
        }
        Ok(())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
