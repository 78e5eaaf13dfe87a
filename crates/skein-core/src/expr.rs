//! Shunting-yard parser for the expression sub-grammar inside `<<...>>`.
//!
//! Operands are literals (`1`, `"hi"`, `true`, `null`), variables (`$gold`),
//! and function calls (`visited("Town")`). Operators are classified by a
//! constant `{precedence, associativity, arity}` table; the yard pops the
//! stack top `o2` under the next operator `o1` when `o1` is left-associative
//! and `prec(o1) <= prec(o2)`, or right-associative and `prec(o1) <
//! prec(o2)`. The postfix output queue is then reduced against an
//! evaluation stack, which must hold exactly one expression at the end.
//!
//! The two stacks and the output queue are contiguous buffers owned by
//! [`ExprParser`] and cleared between expressions, not reallocated.

use crate::ast::{Expr, Operator, Value};
use crate::error::{ErrorKind, SyntaxError};
use crate::lexer::{Token, TokenKind};
use crate::parser::{unexpected_token, TokenCursor};

/// Operator associativity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Assoc {
    Left,
    Right,
}

/// Shape of an operator: how tightly it binds, which way it groups, and
/// how many operands it takes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpInfo {
    pub precedence: u8,
    pub assoc: Assoc,
    pub arity: u8,
}

impl Operator {
    /// Constant operator table.
    pub(crate) const fn info(self) -> OpInfo {
        match self {
            Operator::Not | Operator::Negate => OpInfo {
                precedence: 25,
                assoc: Assoc::Right,
                arity: 1,
            },
            Operator::Multiply | Operator::Divide => OpInfo {
                precedence: 20,
                assoc: Assoc::Left,
                arity: 2,
            },
            Operator::Add | Operator::Subtract => OpInfo {
                precedence: 15,
                assoc: Assoc::Left,
                arity: 2,
            },
            Operator::LessThan
            | Operator::LessThanOrEqual
            | Operator::GreaterThan
            | Operator::GreaterThanOrEqual => OpInfo {
                precedence: 10,
                assoc: Assoc::Left,
                arity: 2,
            },
            Operator::EqualTo | Operator::NotEqualTo => OpInfo {
                precedence: 5,
                assoc: Assoc::Left,
                arity: 2,
            },
            Operator::And => OpInfo {
                precedence: 4,
                assoc: Assoc::Left,
                arity: 2,
            },
            Operator::Or => OpInfo {
                precedence: 3,
                assoc: Assoc::Left,
                arity: 2,
            },
            Operator::Xor => OpInfo {
                precedence: 2,
                assoc: Assoc::Left,
                arity: 2,
            },
        }
    }
}

/// Binary operator for a token kind, if it has one.
fn binary_operator(kind: TokenKind) -> Option<Operator> {
    Some(match kind {
        TokenKind::Add => Operator::Add,
        TokenKind::Minus => Operator::Subtract,
        TokenKind::Multiply => Operator::Multiply,
        TokenKind::Divide => Operator::Divide,
        TokenKind::LessThan => Operator::LessThan,
        TokenKind::LessThanOrEqual => Operator::LessThanOrEqual,
        TokenKind::GreaterThan => Operator::GreaterThan,
        TokenKind::GreaterThanOrEqual => Operator::GreaterThanOrEqual,
        TokenKind::EqualTo => Operator::EqualTo,
        TokenKind::NotEqualTo => Operator::NotEqualTo,
        TokenKind::And => Operator::And,
        TokenKind::Or => Operator::Or,
        TokenKind::Xor => Operator::Xor,
        _ => return None,
    })
}

/// One entry of the operator stack.
#[derive(Debug)]
enum StackEntry {
    Op(Operator),
    /// Grouping `(`; a stack-only sentinel.
    Paren { line: u32, column: u32 },
    /// An open function call and the arguments counted so far.
    Call {
        name: String,
        argc: usize,
        line: u32,
        column: u32,
    },
}

/// One entry of the postfix output queue.
#[derive(Debug)]
enum YardEntry {
    Operand(Expr),
    Op(Operator),
    Call { name: String, argc: usize },
}

/// Reusable shunting-yard state: operator stack, output queue, and the
/// evaluation stack used to rebuild the tree.
#[derive(Debug, Default)]
pub(crate) struct ExprParser {
    ops: Vec<StackEntry>,
    output: Vec<YardEntry>,
    eval: Vec<Expr>,
}

impl ExprParser {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Parse one expression from the cursor, consuming tokens up to the
    /// first token that cannot continue the expression.
    pub(crate) fn parse(&mut self, cursor: &mut TokenCursor<'_>) -> Result<Expr, SyntaxError> {
        self.ops.clear();
        self.output.clear();
        self.eval.clear();

        let start = cursor.peek(0).clone();
        let mut expect_operand = true;
        let mut consumed_any = false;

        loop {
            let tok = cursor.peek(0);
            if expect_operand {
                match tok.kind {
                    TokenKind::Number => {
                        let tok = cursor.next();
                        let value = parse_number(tok)?;
                        self.output.push(YardEntry::Operand(Expr::Value(value)));
                        expect_operand = false;
                    }
                    TokenKind::Str => {
                        let tok = cursor.next();
                        self.output.push(YardEntry::Operand(Expr::Value(Value::Str(
                            tok.text().to_string(),
                        ))));
                        expect_operand = false;
                    }
                    TokenKind::Variable => {
                        let tok = cursor.next();
                        self.output.push(YardEntry::Operand(Expr::Value(
                            Value::Variable(tok.text().to_string()),
                        )));
                        expect_operand = false;
                    }
                    TokenKind::True | TokenKind::False => {
                        let tok = cursor.next();
                        let b = tok.kind == TokenKind::True;
                        self.output
                            .push(YardEntry::Operand(Expr::Value(Value::Bool(b))));
                        expect_operand = false;
                    }
                    TokenKind::Null => {
                        cursor.next();
                        self.output.push(YardEntry::Operand(Expr::Value(Value::Null)));
                        expect_operand = false;
                    }
                    TokenKind::Function => {
                        let tok = cursor.next();
                        let (line, column) = (tok.line, tok.column);
                        let name = tok.text().to_string();
                        let paren = cursor.next();
                        if paren.kind != TokenKind::LeftParen {
                            return Err(unexpected_token(&[TokenKind::LeftParen], paren));
                        }
                        self.ops.push(StackEntry::Call {
                            name,
                            argc: 0,
                            line,
                            column,
                        });
                        // `expect_operand` stays set: the next token is
                        // either the first argument or the closing `)`.
                    }
                    TokenKind::LeftParen => {
                        let tok = cursor.next();
                        self.ops.push(StackEntry::Paren {
                            line: tok.line,
                            column: tok.column,
                        });
                    }
                    TokenKind::Minus => {
                        cursor.next();
                        self.shunt(Operator::Negate);
                    }
                    TokenKind::Not => {
                        cursor.next();
                        self.shunt(Operator::Not);
                    }
                    TokenKind::RightParen => {
                        // Only a zero-argument call may close here.
                        match self.ops.pop() {
                            Some(StackEntry::Call { name, argc: 0, .. }) => {
                                cursor.next();
                                self.output.push(YardEntry::Call { name, argc: 0 });
                                expect_operand = false;
                            }
                            Some(other) => {
                                self.ops.push(other);
                                break;
                            }
                            None => break,
                        }
                    }
                    _ => break,
                }
            } else {
                if let Some(op) = binary_operator(tok.kind) {
                    cursor.next();
                    self.shunt(op);
                    expect_operand = true;
                    consumed_any = true;
                    continue;
                }
                match tok.kind {
                    TokenKind::Comma => {
                        // Argument separator: only meaningful inside a call.
                        self.drain_to_sentinel();
                        match self.ops.last_mut() {
                            Some(StackEntry::Call { argc, .. }) => {
                                *argc += 1;
                                cursor.next();
                                expect_operand = true;
                            }
                            _ => break,
                        }
                    }
                    TokenKind::RightParen => {
                        self.drain_to_sentinel();
                        match self.ops.pop() {
                            Some(StackEntry::Paren { .. }) => {
                                cursor.next();
                            }
                            Some(StackEntry::Call { name, argc, .. }) => {
                                cursor.next();
                                self.output.push(YardEntry::Call {
                                    name,
                                    argc: argc + 1,
                                });
                            }
                            None => {
                                return Err(SyntaxError::new(
                                    ErrorKind::UnbalancedParens,
                                    tok.line,
                                    tok.column,
                                    "')' without a matching '('",
                                ));
                            }
                            Some(other) => {
                                // Operators were all drained; nothing else
                                // can sit between them and a sentinel.
                                self.ops.push(other);
                                break;
                            }
                        }
                    }
                    _ => break,
                }
            }
            consumed_any = true;
        }

        if !consumed_any {
            return Err(SyntaxError::new(
                ErrorKind::EmptyExpression,
                start.line,
                start.column,
                "expected an expression",
            ));
        }
        if expect_operand {
            let tok = cursor.peek(0);
            return Err(SyntaxError::new(
                ErrorKind::UnexpectedToken,
                tok.line,
                tok.column,
                format!("expected an operand, found {}", tok.kind),
            ));
        }

        // Drain what is left on the operator stack; an unmatched `(` or an
        // unclosed call means the parens never balanced.
        while let Some(entry) = self.ops.pop() {
            match entry {
                StackEntry::Op(op) => self.output.push(YardEntry::Op(op)),
                StackEntry::Paren { line, column } | StackEntry::Call { line, column, .. } => {
                    return Err(SyntaxError::new(
                        ErrorKind::UnbalancedParens,
                        line,
                        column,
                        "'(' without a matching ')'",
                    ));
                }
            }
        }

        self.reduce(&start)
    }

    /// Push `o1`, first popping stack operators that bind at least as
    /// tightly (see module docs for the exact rule).
    fn shunt(&mut self, o1: Operator) {
        let i1 = o1.info();
        loop {
            let pop = match self.ops.last() {
                Some(StackEntry::Op(o2)) => {
                    let i2 = o2.info();
                    match i1.assoc {
                        Assoc::Left => i1.precedence <= i2.precedence,
                        Assoc::Right => i1.precedence < i2.precedence,
                    }
                }
                _ => false,
            };
            if !pop {
                break;
            }
            if let Some(StackEntry::Op(o2)) = self.ops.pop() {
                self.output.push(YardEntry::Op(o2));
            }
        }
        self.ops.push(StackEntry::Op(o1));
    }

    /// Pop operators into the output until a `(` or call sentinel is on top.
    fn drain_to_sentinel(&mut self) {
        while matches!(self.ops.last(), Some(StackEntry::Op(_))) {
            if let Some(StackEntry::Op(op)) = self.ops.pop() {
                self.output.push(YardEntry::Op(op));
            }
        }
    }

    /// Rebuild the expression tree from the postfix output queue.
    fn reduce(&mut self, start: &Token) -> Result<Expr, SyntaxError> {
        let malformed =
            || SyntaxError::new(ErrorKind::ParseError, start.line, start.column, "malformed expression");

        for entry in self.output.drain(..) {
            match entry {
                YardEntry::Operand(expr) => self.eval.push(expr),
                YardEntry::Op(op) => {
                    let info = op.info();
                    if info.arity == 1 {
                        let rhs = self.eval.pop().ok_or_else(malformed)?;
                        self.eval.push(Expr::unary(op, rhs));
                    } else {
                        let rhs = self.eval.pop().ok_or_else(malformed)?;
                        let lhs = self.eval.pop().ok_or_else(malformed)?;
                        self.eval.push(Expr::binary(op, lhs, rhs));
                    }
                }
                YardEntry::Call { name, argc } => {
                    if self.eval.len() < argc {
                        return Err(malformed());
                    }
                    let args = self.eval.split_off(self.eval.len() - argc);
                    self.eval.push(Expr::FunctionCall { name, args });
                }
            }
        }

        let expr = self.eval.pop().ok_or_else(malformed)?;
        if !self.eval.is_empty() {
            return Err(malformed());
        }
        Ok(expr)
    }
}

fn parse_number(tok: &Token) -> Result<Value, SyntaxError> {
    let text = tok.text();
    let n: f64 = text.parse().map_err(|_| {
        SyntaxError::new(
            ErrorKind::ParseError,
            tok.line,
            tok.column,
            format!("invalid numeric literal '{text}'"),
        )
    })?;
    Ok(Value::Number(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Operator as Op;
    use crate::lexer::lex;

    /// Lex `src` as the interior of an `<<if ...>>` command and parse the
    /// expression out of it.
    fn parse_expr(src: &str) -> Result<Expr, SyntaxError> {
        let tokens = lex(&format!("<<if {src}>>")).expect("lex failed");
        let mut cursor = TokenCursor::new(&tokens);
        cursor.next(); // <<
        cursor.next(); // if
        let mut parser = ExprParser::new();
        let expr = parser.parse(&mut cursor)?;
        assert_eq!(cursor.peek(0).kind, TokenKind::EndCommand, "leftover tokens");
        Ok(expr)
    }

    fn expr(src: &str) -> Expr {
        parse_expr(src).expect("parse failed")
    }

    fn num(n: f64) -> Expr {
        Expr::Value(Value::Number(n))
    }

    // ── Operands ────────────────────────────────────────────────────

    #[test]
    fn literal_operands() {
        assert_eq!(expr("1"), num(1.0));
        assert_eq!(expr("3.5"), num(3.5));
        assert_eq!(expr("true"), Expr::Value(Value::Bool(true)));
        assert_eq!(expr("null"), Expr::Value(Value::Null));
        assert_eq!(
            expr("\"hi\""),
            Expr::Value(Value::Str("hi".into()))
        );
        assert_eq!(
            expr("$gold"),
            Expr::Value(Value::Variable("$gold".into()))
        );
    }

    // ── Precedence and associativity ────────────────────────────────

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            expr("1 + 2 * 3"),
            Expr::binary(Op::Add, num(1.0), Expr::binary(Op::Multiply, num(2.0), num(3.0)))
        );
    }

    #[test]
    fn left_associative_subtraction() {
        assert_eq!(
            expr("1 - 2 - 3"),
            Expr::binary(Op::Subtract, Expr::binary(Op::Subtract, num(1.0), num(2.0)), num(3.0))
        );
    }

    #[test]
    fn parens_override_precedence() {
        assert_eq!(
            expr("(1 + 2) * 3"),
            Expr::binary(Op::Multiply, Expr::binary(Op::Add, num(1.0), num(2.0)), num(3.0))
        );
    }

    #[test]
    fn comparison_below_arithmetic() {
        assert_eq!(
            expr("$a + 1 < $b * 2"),
            Expr::binary(
                Op::LessThan,
                Expr::binary(Op::Add, Expr::Value(Value::Variable("$a".into())), num(1.0)),
                Expr::binary(Op::Multiply, Expr::Value(Value::Variable("$b".into())), num(2.0)),
            )
        );
    }

    #[test]
    fn logical_chain_groups_and_over_or() {
        assert_eq!(
            expr("$a && $b || $c"),
            Expr::binary(
                Op::Or,
                Expr::binary(
                    Op::And,
                    Expr::Value(Value::Variable("$a".into())),
                    Expr::Value(Value::Variable("$b".into())),
                ),
                Expr::Value(Value::Variable("$c".into())),
            )
        );
    }

    #[test]
    fn xor_binds_loosest() {
        assert_eq!(
            expr("$a || $b ^ $c || $d"),
            Expr::binary(
                Op::Xor,
                Expr::binary(
                    Op::Or,
                    Expr::Value(Value::Variable("$a".into())),
                    Expr::Value(Value::Variable("$b".into())),
                ),
                Expr::binary(
                    Op::Or,
                    Expr::Value(Value::Variable("$c".into())),
                    Expr::Value(Value::Variable("$d".into())),
                ),
            )
        );
    }

    // ── Unary operators ─────────────────────────────────────────────

    #[test]
    fn negate_is_unary() {
        assert_eq!(
            expr("-$a"),
            Expr::unary(Op::Negate, Expr::Value(Value::Variable("$a".into())))
        );
    }

    #[test]
    fn not_binds_tighter_than_and() {
        assert_eq!(
            expr("!$a && $b"),
            Expr::binary(
                Op::And,
                Expr::unary(Op::Not, Expr::Value(Value::Variable("$a".into()))),
                Expr::Value(Value::Variable("$b".into())),
            )
        );
    }

    #[test]
    fn negate_of_group() {
        assert_eq!(
            expr("-(1 + 2)"),
            Expr::unary(Op::Negate, Expr::binary(Op::Add, num(1.0), num(2.0)))
        );
    }

    #[test]
    fn double_negation() {
        assert_eq!(
            expr("!!$a"),
            Expr::unary(Op::Not, Expr::unary(Op::Not, Expr::Value(Value::Variable("$a".into()))))
        );
    }

    // ── Function calls ──────────────────────────────────────────────

    #[test]
    fn zero_argument_call() {
        assert_eq!(
            expr("random()"),
            Expr::FunctionCall {
                name: "random".into(),
                args: vec![],
            }
        );
    }

    #[test]
    fn call_with_arguments() {
        assert_eq!(
            expr("min(1, 2 + 3)"),
            Expr::FunctionCall {
                name: "min".into(),
                args: vec![num(1.0), Expr::binary(Op::Add, num(2.0), num(3.0))],
            }
        );
    }

    #[test]
    fn nested_calls() {
        assert_eq!(
            expr("max(min(1, 2), 3)"),
            Expr::FunctionCall {
                name: "max".into(),
                args: vec![
                    Expr::FunctionCall {
                        name: "min".into(),
                        args: vec![num(1.0), num(2.0)],
                    },
                    num(3.0),
                ],
            }
        );
    }

    #[test]
    fn call_inside_arithmetic() {
        assert_eq!(
            expr("1 + visited(\"Town\") * 2"),
            Expr::binary(
                Op::Add,
                num(1.0),
                Expr::binary(
                    Op::Multiply,
                    Expr::FunctionCall {
                        name: "visited".into(),
                        args: vec![Expr::Value(Value::Str("Town".into()))],
                    },
                    num(2.0),
                ),
            )
        );
    }

    // ── Failures ────────────────────────────────────────────────────

    #[test]
    fn empty_expression() {
        let err = parse_expr("").expect_err("expected error");
        assert_eq!(err.kind, ErrorKind::EmptyExpression);
    }

    #[test]
    fn unclosed_paren() {
        let err = parse_expr("(1 + 2").expect_err("expected error");
        assert_eq!(err.kind, ErrorKind::UnbalancedParens);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn stray_close_paren() {
        let err = parse_expr("1 + 2)").expect_err("expected error");
        assert_eq!(err.kind, ErrorKind::UnbalancedParens);
    }

    #[test]
    fn dangling_operator() {
        let err = parse_expr("1 +").expect_err("expected error");
        assert_eq!(err.kind, ErrorKind::UnexpectedToken);
        assert!(err.message.contains("expected an operand"));
    }

    #[test]
    fn unclosed_call() {
        let err = parse_expr("min(1, 2").expect_err("expected error");
        assert_eq!(err.kind, ErrorKind::UnbalancedParens);
    }
}
