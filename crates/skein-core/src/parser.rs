//! Recursive descent parser for Skein token streams.
//!
//! The parser is LL with one- and two-token lookahead over an index
//! cursor; `snapshot`/`restore` give O(1) speculative parsing where the
//! grammar alone cannot decide (a `<<if>>` after a `->` option is that
//! option's guard only when it sits on the same line).
//!
//! There is no error recovery: the first error halts the parse and the
//! partial tree is discarded. The enclosing node name is threaded through
//! the parsing calls so synthetic nodes (shortcut-option bodies, group
//! epilogues) can derive their names without parent back-pointers.

use crate::ast::{
    AssignOp, AssignmentStatement, Block, Clause, CustomCommand, Expr, IfStatement, Node,
    OptionStatement, ShortcutOption, ShortcutOptionGroup, Statement,
};
use crate::error::{ErrorKind, SyntaxError};
use crate::expr::ExprParser;
use crate::lexer::{Token, TokenKind};

/// Fallback for peeking past the end of the token slice.
const END_OF_INPUT: Token = Token {
    kind: TokenKind::EndOfInput,
    value: None,
    line: 1,
    column: 1,
};

/// An index cursor over a lexed token slice.
///
/// Peeking past the end yields `EndOfInput`. Snapshots are plain indices,
/// so forking and rewinding cost nothing.
pub(crate) struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    pub(crate) fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    /// The token `n` positions ahead, without consuming anything.
    pub(crate) fn peek(&self, n: usize) -> &'a Token {
        self.tokens.get(self.pos + n).unwrap_or(&END_OF_INPUT)
    }

    /// Consume and return the next token.
    pub(crate) fn next(&mut self) -> &'a Token {
        let tok = self.tokens.get(self.pos).unwrap_or(&END_OF_INPUT);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn snapshot(&self) -> usize {
        self.pos
    }

    pub(crate) fn restore(&mut self, snapshot: usize) {
        self.pos = snapshot;
    }
}

/// Build an `UnexpectedToken` error listing the kinds that would have
/// been accepted.
pub(crate) fn unexpected_token(expected: &[TokenKind], found: &Token) -> SyntaxError {
    let list = expected
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    SyntaxError::new(
        ErrorKind::UnexpectedToken,
        found.line,
        found.column,
        format!("unexpected {}, expected {list}", found.kind),
    )
}

/// Parse a token stream into the top-level `Start` node.
pub fn parse_tokens(tokens: &[Token]) -> Result<Node, SyntaxError> {
    if !matches!(tokens.last().map(|t| t.kind), Some(TokenKind::EndOfInput)) {
        return Err(SyntaxError::new(
            ErrorKind::ParseError,
            1,
            1,
            "token stream does not end with end of input",
        ));
    }
    Parser::new(tokens).parse_start()
}

/// What terminates the statement sequence currently being parsed, besides
/// a dedent or the end of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopSet {
    /// Only dedent / end of input.
    Node,
    /// Additionally `<<elseif>>`, `<<else>>`, and `<<endif>>` tags.
    IfClause,
}

struct Parser<'a> {
    cursor: TokenCursor<'a>,
    exprs: ExprParser,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            cursor: TokenCursor::new(tokens),
            exprs: ExprParser::new(),
        }
    }

    fn parse_start(&mut self) -> Result<Node, SyntaxError> {
        let statements = self.parse_statement_seq("Start", StopSet::Node)?;
        self.expect(TokenKind::EndOfInput)?;
        Ok(Node {
            name: "Start".to_string(),
            statements,
        })
    }

    // ── Lookahead helpers ──────────────────────────────────────────

    fn expect(&mut self, kind: TokenKind) -> Result<&'a Token, SyntaxError> {
        let tok = self.cursor.peek(0);
        if tok.kind == kind {
            Ok(self.cursor.next())
        } else {
            Err(unexpected_token(&[kind], tok))
        }
    }

    fn at_clause_tag(&self) -> bool {
        self.cursor.peek(0).kind == TokenKind::BeginCommand
            && matches!(
                self.cursor.peek(1).kind,
                TokenKind::ElseIf | TokenKind::Else | TokenKind::EndIf
            )
    }

    fn at_stop(&self, stop: StopSet) -> bool {
        match self.cursor.peek(0).kind {
            TokenKind::Dedent | TokenKind::EndOfInput => true,
            _ => stop == StopSet::IfClause && self.at_clause_tag(),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.exprs.parse(&mut self.cursor)
    }

    // ── Statements ─────────────────────────────────────────────────

    /// Parse statements until the stop set is hit. A shortcut-option group
    /// absorbs the remainder of the sequence as its epilogue, so it is
    /// always the last statement parsed here.
    fn parse_statement_seq(
        &mut self,
        node_name: &str,
        stop: StopSet,
    ) -> Result<Vec<Statement>, SyntaxError> {
        let mut statements = Vec::new();
        while !self.at_stop(stop) {
            if self.cursor.peek(0).kind == TokenKind::ShortcutOption {
                statements.push(self.parse_shortcut_group(node_name, stop)?);
                break;
            }
            statements.push(self.parse_statement(node_name)?);
        }
        Ok(statements)
    }

    fn parse_statement(&mut self, node_name: &str) -> Result<Statement, SyntaxError> {
        let tok = self.cursor.peek(0);
        match tok.kind {
            TokenKind::Indent => self.parse_block(node_name),
            TokenKind::OptionStart => self.parse_option(),
            TokenKind::Text => {
                let tok = self.cursor.next();
                Ok(Statement::Line(tok.text().to_string()))
            }
            TokenKind::BeginCommand => {
                let next = self.cursor.peek(1);
                match next.kind {
                    TokenKind::If => self.parse_if(node_name),
                    TokenKind::Set => self.parse_assignment(),
                    TokenKind::Text => self.parse_custom_command(),
                    TokenKind::ElseIf | TokenKind::Else | TokenKind::EndIf => {
                        Err(SyntaxError::new(
                            ErrorKind::ParseError,
                            next.line,
                            next.column,
                            format!("unexpected {} outside an if statement", next.kind),
                        ))
                    }
                    _ => Err(unexpected_token(
                        &[TokenKind::If, TokenKind::Set, TokenKind::Text],
                        next,
                    )),
                }
            }
            _ => Err(unexpected_token(
                &[
                    TokenKind::Text,
                    TokenKind::BeginCommand,
                    TokenKind::OptionStart,
                    TokenKind::ShortcutOption,
                    TokenKind::Indent,
                ],
                tok,
            )),
        }
    }

    fn parse_block(&mut self, node_name: &str) -> Result<Statement, SyntaxError> {
        self.expect(TokenKind::Indent)?;
        let statements = self.parse_statement_seq(node_name, StopSet::Node)?;
        self.expect(TokenKind::Dedent)?;
        Ok(Statement::Block(Block { statements }))
    }

    fn parse_option(&mut self) -> Result<Statement, SyntaxError> {
        self.expect(TokenKind::OptionStart)?;
        let first = self.expect(TokenKind::Text)?.text().to_string();
        let statement = if self.cursor.peek(0).kind == TokenKind::OptionDelimit {
            self.cursor.next();
            let destination = self.expect(TokenKind::Text)?.text().to_string();
            OptionStatement {
                destination,
                label: Some(first),
            }
        } else {
            OptionStatement {
                destination: first,
                label: None,
            }
        };
        self.expect(TokenKind::OptionEnd)?;
        Ok(Statement::Option(statement))
    }

    fn parse_custom_command(&mut self) -> Result<Statement, SyntaxError> {
        self.expect(TokenKind::BeginCommand)?;
        let command = self.expect(TokenKind::Text)?.text().to_string();
        self.expect(TokenKind::EndCommand)?;
        Ok(Statement::CustomCommand(CustomCommand { command }))
    }

    fn parse_assignment(&mut self) -> Result<Statement, SyntaxError> {
        self.expect(TokenKind::BeginCommand)?;
        self.expect(TokenKind::Set)?;
        let variable = self.expect(TokenKind::Variable)?.text().to_string();
        let tok = self.cursor.peek(0);
        let op = match tok.kind {
            TokenKind::EqualToOrAssign => AssignOp::Assign,
            TokenKind::AddAssign => AssignOp::Add,
            TokenKind::MinusAssign => AssignOp::Subtract,
            TokenKind::MultiplyAssign => AssignOp::Multiply,
            TokenKind::DivideAssign => AssignOp::Divide,
            _ => {
                return Err(unexpected_token(
                    &[
                        TokenKind::EqualToOrAssign,
                        TokenKind::AddAssign,
                        TokenKind::MinusAssign,
                        TokenKind::MultiplyAssign,
                        TokenKind::DivideAssign,
                    ],
                    tok,
                ));
            }
        };
        self.cursor.next();
        let value = self.parse_expression()?;
        self.expect(TokenKind::EndCommand)?;
        Ok(Statement::Assignment(AssignmentStatement {
            variable,
            op,
            value,
        }))
    }

    // ── If statements ──────────────────────────────────────────────

    fn parse_if(&mut self, node_name: &str) -> Result<Statement, SyntaxError> {
        self.expect(TokenKind::BeginCommand)?;
        self.expect(TokenKind::If)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::EndCommand)?;
        let statements = self.parse_clause_body(node_name)?;
        let mut clauses = vec![Clause {
            condition: Some(condition),
            statements,
        }];

        let mut seen_else = false;
        loop {
            let tok = self.cursor.peek(0);
            if tok.kind != TokenKind::BeginCommand {
                return Err(unexpected_token(&[TokenKind::EndIf], tok));
            }
            let tag = self.cursor.peek(1);
            match tag.kind {
                TokenKind::ElseIf if !seen_else => {
                    self.cursor.next();
                    self.cursor.next();
                    let condition = self.parse_expression()?;
                    self.expect(TokenKind::EndCommand)?;
                    let statements = self.parse_clause_body(node_name)?;
                    clauses.push(Clause {
                        condition: Some(condition),
                        statements,
                    });
                }
                TokenKind::Else if !seen_else => {
                    self.cursor.next();
                    self.cursor.next();
                    self.expect(TokenKind::EndCommand)?;
                    seen_else = true;
                    let statements = self.parse_clause_body(node_name)?;
                    clauses.push(Clause {
                        condition: None,
                        statements,
                    });
                }
                TokenKind::EndIf => {
                    self.cursor.next();
                    self.cursor.next();
                    self.expect(TokenKind::EndCommand)?;
                    break;
                }
                TokenKind::ElseIf | TokenKind::Else => {
                    return Err(SyntaxError::new(
                        ErrorKind::ParseError,
                        tag.line,
                        tag.column,
                        format!("unexpected {} after 'else'", tag.kind),
                    ));
                }
                _ => {
                    return Err(unexpected_token(
                        &[TokenKind::ElseIf, TokenKind::Else, TokenKind::EndIf],
                        tag,
                    ));
                }
            }
        }

        Ok(Statement::If(IfStatement { clauses }))
    }

    /// Parse one clause body. A leading indent is transparent here: its
    /// statements are spliced into the clause so that indented and
    /// unindented clause bodies produce the same tree.
    fn parse_clause_body(&mut self, node_name: &str) -> Result<Vec<Statement>, SyntaxError> {
        let mut statements = Vec::new();
        loop {
            if self.at_stop(StopSet::IfClause) {
                break;
            }
            match self.cursor.peek(0).kind {
                TokenKind::Indent => {
                    self.cursor.next();
                    let inner = self.parse_statement_seq(node_name, StopSet::Node)?;
                    self.expect(TokenKind::Dedent)?;
                    statements.extend(inner);
                }
                TokenKind::ShortcutOption => {
                    statements.push(self.parse_shortcut_group(node_name, StopSet::IfClause)?);
                    break;
                }
                _ => statements.push(self.parse_statement(node_name)?),
            }
        }
        Ok(statements)
    }

    // ── Shortcut options ───────────────────────────────────────────

    fn parse_shortcut_group(
        &mut self,
        node_name: &str,
        stop: StopSet,
    ) -> Result<Statement, SyntaxError> {
        let mut options = Vec::new();
        while self.cursor.peek(0).kind == TokenKind::ShortcutOption {
            let index = options.len() + 1;
            options.push(self.parse_shortcut_option(node_name, index)?);
        }

        // All options rejoin to the remainder of the enclosing node.
        let epilogue_name = format!("{node_name}.Epilogue");
        let statements = self.parse_statement_seq(&epilogue_name, stop)?;
        Ok(Statement::ShortcutOptionGroup(ShortcutOptionGroup {
            options,
            epilogue: Node {
                name: epilogue_name,
                statements,
            },
        }))
    }

    fn parse_shortcut_option(
        &mut self,
        node_name: &str,
        index: usize,
    ) -> Result<ShortcutOption, SyntaxError> {
        let arrow_line = self.expect(TokenKind::ShortcutOption)?.line;
        let label = self.expect(TokenKind::Text)?.text().to_string();

        // A `<<if ...>>` is this option's guard only when it sits on the
        // same line; otherwise it belongs to whatever follows the group.
        // Fork the cursor, look inside the command, and rewind if it is
        // not ours.
        let mut condition = None;
        let fork = self.cursor.snapshot();
        if self.cursor.peek(0).kind == TokenKind::BeginCommand {
            let begin = self.cursor.next();
            if begin.line == arrow_line && self.cursor.peek(0).kind == TokenKind::If {
                self.cursor.next();
                let guard = self.parse_expression()?;
                self.expect(TokenKind::EndCommand)?;
                condition = Some(guard);
            } else {
                self.cursor.restore(fork);
            }
        }

        let mut body = None;
        if self.cursor.peek(0).kind == TokenKind::Indent {
            self.cursor.next();
            let name = format!("{node_name}.{index}");
            let statements = self.parse_statement_seq(&name, StopSet::Node)?;
            self.expect(TokenKind::Dedent)?;
            body = Some(Node { name, statements });
        }

        Ok(ShortcutOption {
            label,
            condition,
            body,
        })
    }
}
