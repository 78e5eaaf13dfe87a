//! End-to-end tests: whole scripts through lex + parse, plus the
//! serialization surface downstream tools rely on.

use skein_core::ast::{Statement, Value};
use skein_core::visit::{self, Visitor};
use skein_core::{parse, unparse, ErrorKind, Node};

const MARKET_SCRIPT: &str = r#"You arrive at the market.
<<set $gold = 15>>
<<set $haggled = false>>

<<if $gold >= 20>>
  The merchant eyes your heavy purse.
<<elseif $gold >= 10>>
  The merchant gives you a practiced smile.
<<else>>
  The merchant barely looks up.
<<endif>>

-> Buy the lantern <<if $gold >= 10>>
  <<set $gold -= 10>>
  <<set $has_lantern = true>>
  It is heavier than it looks.
-> Haggle
  <<set $haggled = true>>
  <<play haggle_theme>>
-> Walk away

The crowd swallows you again.
[[Head for the gate|CityGate]]
[[Stay in the market]]
"#;

#[test]
fn market_script_parses_into_expected_shape() {
    let node = parse(MARKET_SCRIPT).expect("script should parse");
    assert_eq!(node.name, "Start");

    // Line, two sets, the if, then the shortcut group (which absorbs the
    // rest of the node as its epilogue).
    assert_eq!(node.statements.len(), 5);
    assert!(matches!(node.statements[0], Statement::Line(_)));
    assert!(matches!(node.statements[1], Statement::Assignment(_)));
    assert!(matches!(node.statements[2], Statement::Assignment(_)));

    let Statement::If(if_stmt) = &node.statements[3] else {
        panic!("expected If");
    };
    assert_eq!(if_stmt.clauses.len(), 3);
    assert!(if_stmt.clauses[0].condition.is_some());
    assert!(if_stmt.clauses[2].condition.is_none());

    let Statement::ShortcutOptionGroup(group) = &node.statements[4] else {
        panic!("expected ShortcutOptionGroup");
    };
    assert_eq!(group.options.len(), 3);
    assert_eq!(group.options[0].label, "Buy the lantern");
    assert!(group.options[0].condition.is_some());
    assert_eq!(
        group.options[0].body.as_ref().map(|b| b.name.as_str()),
        Some("Start.1")
    );
    assert!(group.options[2].condition.is_none());
    assert!(group.options[2].body.is_none());

    assert_eq!(group.epilogue.name, "Start.Epilogue");
    assert_eq!(group.epilogue.statements.len(), 3);
    assert!(matches!(group.epilogue.statements[0], Statement::Line(_)));
    assert!(matches!(group.epilogue.statements[1], Statement::Option(_)));
    assert!(matches!(group.epilogue.statements[2], Statement::Option(_)));
}

#[test]
fn market_script_round_trips_through_unparse() {
    let first = parse(MARKET_SCRIPT).expect("script should parse");
    let emitted = unparse::unparse_node(&first);
    let second = parse(&emitted).expect("emitted script should parse");
    assert_eq!(first, second);
}

#[test]
fn market_script_round_trips_through_serde() {
    let node = parse(MARKET_SCRIPT).expect("script should parse");
    let json = serde_json::to_string(&node).expect("serialize failed");
    let back: Node = serde_json::from_str(&json).expect("deserialize failed");
    assert_eq!(node, back);
}

#[test]
fn first_error_aborts_with_position() {
    let src = "fine line\n<<if (1 + 2>>\nnever reached";
    let err = parse(src).expect_err("expected error");
    assert_eq!(err.kind, ErrorKind::UnbalancedParens);
    assert_eq!(err.line, 2);
    assert!(err.to_string().starts_with("Line 2:"));
}

#[test]
fn traversal_covers_every_assignment() {
    struct CountAssignments(usize, Vec<f64>);

    impl Visitor for CountAssignments {
        fn visit_statement(&mut self, statement: &Statement) {
            if matches!(statement, Statement::Assignment(_)) {
                self.0 += 1;
            }
        }

        fn visit_value(&mut self, value: &Value) {
            if let Value::Number(n) = value {
                self.1.push(*n);
            }
        }
    }

    let node = parse(MARKET_SCRIPT).expect("script should parse");
    let mut counter = CountAssignments(0, Vec::new());
    visit::walk_node(&mut counter, &node);
    // Two at the top, two in the lantern body, one in the haggle body.
    assert_eq!(counter.0, 5);
    assert!(counter.1.contains(&15.0));
    assert!(counter.1.contains(&20.0));
}

#[test]
fn parallel_parses_share_nothing() {
    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(|| parse(MARKET_SCRIPT).expect("script should parse")))
        .collect();
    let mut results = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"));
    let first = results.next().expect("at least one result");
    assert!(results.all(|r| r == first));
}
