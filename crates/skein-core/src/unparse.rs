//! AST unparser: converts a parsed tree back to canonical source text.
//!
//! The output is not byte-identical to the original source; it is a
//! normalized rendering (two-space indents, one statement per line, fully
//! parenthesized expressions) chosen so that re-parsing it yields a
//! structurally equal AST. That round-trip holds for any tree produced by
//! [`crate::parse`]; hand-built trees containing text the lexer could
//! never produce (a dialogue line starting with `<<`, a string with a
//! newline) are not guaranteed.

use std::fmt::Write;

use crate::ast::{Expr, Node, Statement, Value};

/// Render a node's statements as canonical source text.
pub fn unparse_node(node: &Node) -> String {
    let mut out = String::new();
    write_statements(&mut out, &node.statements, 0);
    out
}

/// Render a single expression, fully parenthesized.
pub fn unparse_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

fn push_indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

fn write_statements(out: &mut String, statements: &[Statement], level: usize) {
    for statement in statements {
        write_statement(out, statement, level);
    }
}

fn write_statement(out: &mut String, statement: &Statement, level: usize) {
    match statement {
        Statement::Line(text) => {
            push_indent(out, level);
            out.push_str(text);
            out.push('\n');
        }
        Statement::Block(block) => {
            write_statements(out, &block.statements, level + 1);
        }
        Statement::Option(option) => {
            push_indent(out, level);
            match &option.label {
                Some(label) => {
                    let _ = write!(out, "[[{label}|{}]]", option.destination);
                }
                None => {
                    let _ = write!(out, "[[{}]]", option.destination);
                }
            }
            out.push('\n');
        }
        Statement::CustomCommand(command) => {
            push_indent(out, level);
            let _ = write!(out, "<<{}>>", command.command);
            out.push('\n');
        }
        Statement::Assignment(assignment) => {
            push_indent(out, level);
            let _ = write!(out, "<<set {} {} ", assignment.variable, assignment.op.symbol());
            write_expr(out, &assignment.value);
            out.push_str(">>\n");
        }
        Statement::If(stmt) => {
            for (i, clause) in stmt.clauses.iter().enumerate() {
                push_indent(out, level);
                match (&clause.condition, i) {
                    (Some(condition), 0) => {
                        out.push_str("<<if ");
                        write_expr(out, condition);
                        out.push_str(">>\n");
                    }
                    (Some(condition), _) => {
                        out.push_str("<<elseif ");
                        write_expr(out, condition);
                        out.push_str(">>\n");
                    }
                    (None, _) => out.push_str("<<else>>\n"),
                }
                write_statements(out, &clause.statements, level + 1);
            }
            push_indent(out, level);
            out.push_str("<<endif>>\n");
        }
        Statement::ShortcutOptionGroup(group) => {
            for option in &group.options {
                push_indent(out, level);
                let _ = write!(out, "-> {}", option.label);
                if let Some(condition) = &option.condition {
                    out.push_str(" <<if ");
                    write_expr(out, condition);
                    out.push_str(">>");
                }
                out.push('\n');
                if let Some(body) = &option.body {
                    write_statements(out, &body.statements, level + 1);
                }
            }
            write_statements(out, &group.epilogue.statements, level);
        }
    }
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Value(value) => write_value(out, value),
        Expr::Compound {
            lhs: Some(lhs),
            op,
            rhs,
        } => {
            out.push('(');
            write_expr(out, lhs);
            let _ = write!(out, " {} ", op.symbol());
            write_expr(out, rhs);
            out.push(')');
        }
        // Unary: a space after the operator keeps `- 5` an operator
        // application instead of re-lexing as the literal `-5`.
        Expr::Compound { lhs: None, op, rhs } => {
            let _ = write!(out, "({} ", op.symbol());
            write_expr(out, rhs);
            out.push(')');
        }
        Expr::FunctionCall { name, args } => {
            let _ = write!(out, "{name}(");
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, arg);
            }
            out.push(')');
        }
    }
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Number(n) => {
            let rendered = format!("{n}");
            // Very large magnitudes format with an exponent, which the
            // lexer does not accept; fall back to plain decimal digits.
            if rendered.contains('e') || rendered.contains('E') {
                let _ = write!(out, "{n:.0}");
            } else {
                out.push_str(&rendered);
            }
        }
        Value::Variable(name) => out.push_str(name),
        Value::Str(s) => {
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    _ => out.push(c),
                }
            }
            out.push('"');
        }
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Null => out.push_str("null"),
    }
}
