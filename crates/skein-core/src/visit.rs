//! Pre-order AST traversal in document order.
//!
//! Downstream passes (code generation, linting, analysis) each need to see
//! every entity of a parsed tree exactly once, in the order it appears in
//! the source. Implement [`Visitor`] with the hooks you care about and hand
//! the tree to [`walk_node`]; every hook is called on an entity before its
//! children are walked.

use crate::ast::{Clause, Expr, Node, ShortcutOption, Statement, Value};

/// Callbacks for AST traversal. Every method has a no-op default, so a
/// visitor only implements the entities it cares about.
pub trait Visitor {
    fn visit_node(&mut self, _node: &Node) {}
    fn visit_statement(&mut self, _statement: &Statement) {}
    fn visit_clause(&mut self, _clause: &Clause) {}
    fn visit_shortcut_option(&mut self, _option: &ShortcutOption) {}
    fn visit_expr(&mut self, _expr: &Expr) {}
    fn visit_value(&mut self, _value: &Value) {}
}

/// Walk a node and everything beneath it.
pub fn walk_node<V: Visitor + ?Sized>(visitor: &mut V, node: &Node) {
    visitor.visit_node(node);
    for statement in &node.statements {
        walk_statement(visitor, statement);
    }
}

/// Walk one statement and everything beneath it.
pub fn walk_statement<V: Visitor + ?Sized>(visitor: &mut V, statement: &Statement) {
    visitor.visit_statement(statement);
    match statement {
        Statement::Line(_) | Statement::Option(_) | Statement::CustomCommand(_) => {}
        Statement::Block(block) => {
            for inner in &block.statements {
                walk_statement(visitor, inner);
            }
        }
        Statement::If(stmt) => {
            for clause in &stmt.clauses {
                visitor.visit_clause(clause);
                if let Some(condition) = &clause.condition {
                    walk_expr(visitor, condition);
                }
                for inner in &clause.statements {
                    walk_statement(visitor, inner);
                }
            }
        }
        Statement::ShortcutOptionGroup(group) => {
            for option in &group.options {
                visitor.visit_shortcut_option(option);
                if let Some(condition) = &option.condition {
                    walk_expr(visitor, condition);
                }
                if let Some(body) = &option.body {
                    walk_node(visitor, body);
                }
            }
            walk_node(visitor, &group.epilogue);
        }
        Statement::Assignment(assignment) => {
            walk_expr(visitor, &assignment.value);
        }
    }
}

/// Walk one expression tree.
pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    visitor.visit_expr(expr);
    match expr {
        Expr::Value(value) => visitor.visit_value(value),
        Expr::Compound { lhs, rhs, .. } => {
            if let Some(lhs) = lhs {
                walk_expr(visitor, lhs);
            }
            walk_expr(visitor, rhs);
        }
        Expr::FunctionCall { args, .. } => {
            for arg in args {
                walk_expr(visitor, arg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    /// Collects what the walk touches, in order.
    #[derive(Default)]
    struct Recorder {
        nodes: Vec<String>,
        lines: Vec<String>,
        values: usize,
    }

    impl Visitor for Recorder {
        fn visit_node(&mut self, node: &Node) {
            self.nodes.push(node.name.clone());
        }

        fn visit_statement(&mut self, statement: &Statement) {
            if let Statement::Line(text) = statement {
                self.lines.push(text.clone());
            }
        }

        fn visit_value(&mut self, _value: &Value) {
            self.values += 1;
        }
    }

    #[test]
    fn walks_in_document_order() {
        let node = parse("one\n-> Yes\n  inside\n-> No\nafter").expect("parse failed");
        let mut rec = Recorder::default();
        walk_node(&mut rec, &node);
        assert_eq!(rec.nodes, vec!["Start", "Start.1", "Start.Epilogue"]);
        assert_eq!(rec.lines, vec!["one", "inside", "after"]);
    }

    #[test]
    fn visits_every_expression_value() {
        let node = parse("<<if $a == 1 && $b == 2>>\nx\n<<endif>>").expect("parse failed");
        let mut rec = Recorder::default();
        walk_node(&mut rec, &node);
        assert_eq!(rec.values, 4);
    }
}
