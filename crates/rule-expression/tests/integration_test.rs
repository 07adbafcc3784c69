//! 规则表达式集成测试
//!
//! 覆盖从表达式字符串到分词、折叠、SQL、求值和语法树的完整流程。

use rule_expression::collapse::collapse;
use rule_expression::lexer::tokenize;
use rule_expression::{CompilerLimits, RuleError, RuleExpression, Token, TokenKind};
use serde_json::{Value, json};
use std::collections::HashMap;

fn params(value: Value) -> HashMap<String, Value> {
    serde_json::from_value(value).unwrap()
}

fn tokens(list: &[(TokenKind, &str)]) -> Vec<Token> {
    list.iter().map(|(kind, value)| Token::new(*kind, *value)).collect()
}

const MIXED: &str = "aaa == 10 && hello != true || (_term >= '2012-12-22' && _term <= '2012-01-01') && asdf != true || abe == 10";

// ==================== 分词测试 ====================

#[test]
fn test_tokenize_table() {
    use TokenKind::*;

    let cases: Vec<(&str, Vec<Token>, bool)> = vec![
        (
            r#" event_dst_port == "80""#,
            tokens(&[(Identity, "event_dst_port"), (Comparator, "=="), (String, "80")]),
            true,
        ),
        (
            r#"     event_dst_port = "80""#,
            tokens(&[(Identity, "event_dst_port"), (NoMatch, r#"= "80""#)]),
            false,
        ),
        (
            "((_term >= '2012-12-22')) && abe == 10",
            tokens(&[
                (LeftBracket, "("),
                (LeftBracket, "("),
                (Identity, "_term"),
                (Comparator, ">="),
                (String, "2012-12-22"),
                (RightBracket, ")"),
                (RightBracket, ")"),
                (LogicalOp, "&&"),
                (Identity, "abe"),
                (Comparator, "=="),
                (Number, "10"),
            ]),
            true,
        ),
        (
            "((_term >= '2012-12-22'))) && abe == 10",
            tokens(&[
                (LeftBracket, "("),
                (LeftBracket, "("),
                (Identity, "_term"),
                (Comparator, ">="),
                (String, "2012-12-22"),
                (RightBracket, ")"),
                (RightBracket, ")"),
                (NoMatch, ") && abe == 10"),
            ]),
            false,
        ),
        (
            r#"(total-attack-time > "10")"#,
            tokens(&[
                (LeftBracket, "("),
                (Identity, "total-attack-time"),
                (Comparator, ">"),
                (String, "10"),
                (RightBracket, ")"),
            ]),
            true,
        ),
    ];

    for (input, expected, valid) in cases {
        let rule = RuleExpression::new(input);
        assert_eq!(rule.tokens(), expected.as_slice(), "input: {}", input);
        assert_eq!(rule.is_valid(), valid, "input: {}", input);
    }
}

#[test]
fn test_empty_brackets_are_invalid() {
    let rule = RuleExpression::new("()");
    assert!(!rule.is_valid());
    let last = rule.tokens().last().unwrap();
    assert_eq!(last.kind, TokenKind::NoMatch);
    assert_eq!(last.value, ")");
}

#[test]
fn test_mixed_expression_identities() {
    let rule = RuleExpression::new(MIXED);
    assert!(rule.is_valid());
    assert_eq!(rule.identities(), ["aaa", "hello", "_term", "asdf", "abe"]);
    assert_eq!(rule.tokens().len(), 25);
}

// ==================== 括号折叠测试 ====================

#[test]
fn test_collapse_double_nesting() {
    let rule = RuleExpression::new("((_term >= '2012-12-22')) && abe == 10");
    assert!(rule.is_valid());

    let collapsed = rule.collapsed();
    assert_eq!(collapsed.len(), 5);
    assert_eq!(collapsed[0].kind, TokenKind::SubExpression);
    assert_eq!(collapsed[0].children.len(), 1);

    let inner = &collapsed[0].children[0];
    assert_eq!(inner.kind, TokenKind::SubExpression);
    assert_eq!(
        inner.children,
        tokens(&[
            (TokenKind::Identity, "_term"),
            (TokenKind::Comparator, ">="),
            (TokenKind::String, "2012-12-22"),
        ])
    );
    assert_eq!(collapsed[1], Token::new(TokenKind::LogicalOp, "&&"));
}

#[test]
fn test_collapse_keeps_trailing_no_match() {
    let output = tokenize("((_term >= '2012-12-22'))) && abe == 10");
    let collapsed = collapse(&output.tokens);
    assert_eq!(collapsed.len(), 2);
    assert_eq!(collapsed[0].kind, TokenKind::SubExpression);
    assert_eq!(collapsed[1], Token::new(TokenKind::NoMatch, ") && abe == 10"));
}

#[test]
fn test_collapse_mixed_expression() {
    let rule = RuleExpression::new(MIXED);
    let collapsed = rule.collapsed();
    assert_eq!(collapsed.len(), 17);
    assert_eq!(collapsed[8].kind, TokenKind::SubExpression);
    assert_eq!(collapsed[8].children.len(), 7);
}

// ==================== 表达式还原测试 ====================

#[test]
fn test_normalized_round_trip() {
    let cases = [
        ("event_dst_port == '80'", "event_dst_port == '80'"),
        (r#"event_dst_port == "80'80""#, r#"event_dst_port == "80'80""#),
        (
            MIXED,
            "aaa == 10 && hello != true || ( _term >= '2012-12-22' && _term <= '2012-01-01' ) && asdf != true || abe == 10",
        ),
        (
            "((_term >= '2012-12-22')) && abe == 10",
            "( ( _term >= '2012-12-22' ) ) && abe == 10",
        ),
    ];

    for (input, expected) in cases {
        let rule = RuleExpression::new(input);
        assert_eq!(rule.normalized(), expected);

        let again = RuleExpression::new(rule.normalized());
        assert_eq!(again.tokens(), rule.tokens(), "input: {}", input);
    }
}

// ==================== SQL 转换测试 ====================

#[test]
fn test_sql_projection() {
    let rule = RuleExpression::new(r#"event_dst_port contains "80""#);
    assert_eq!(rule.expression_sql(), "event_dst_port LIKE concat('%', ?, '%')");
    assert_eq!(rule.parameters_sql(), [json!("80")]);

    let rule = RuleExpression::new(r#"event_dst_port == "80""#);
    assert_eq!(rule.expression_sql(), "event_dst_port = ?");
    assert_eq!(rule.parameters_sql(), [json!("80")]);

    let rule = RuleExpression::new(MIXED);
    assert_eq!(
        rule.expression_sql(),
        "aaa = ? AND hello != ? OR ( _term >= ? AND _term <= ? ) AND asdf != ? OR abe = ?"
    );
    assert_eq!(
        rule.parameters_sql(),
        [
            json!(10.0),
            json!(true),
            json!("2012-12-22"),
            json!("2012-01-01"),
            json!(true),
            json!(10.0)
        ]
    );

    let rule = RuleExpression::new("((_term >= '2012-12-22')) && abe == 10");
    assert_eq!(rule.expression_sql(), "( ( _term >= ? ) ) AND abe = ?");
}

#[test]
fn test_sql_wildcard_and_regexp() {
    let rule = RuleExpression::new(
        "a startsWith 'x' || b notEndsWith 'y' && c regexp '^z' && d notContains 'w'",
    );
    assert_eq!(
        rule.expression_sql(),
        "a LIKE concat(?, '%') OR b NOT LIKE concat('%', ?) AND c REGEXP ? AND d NOT LIKE concat('%', ?, '%')"
    );
    assert_eq!(
        rule.parameters_sql(),
        [json!("x"), json!("y"), json!("^z"), json!("w")]
    );
}

// ==================== 求值测试 ====================

#[test]
fn test_evaluate_table() {
    let cases = [
        (r#"event_dst_port == "abc""#, json!({"event_dst_port": "Abc"}), false),
        (r#"event_dst_port == "8080""#, json!({"event_dst_port": 8080}), false),
        (r#"event_dst_port == "8080""#, json!({"event_dst_port": "8080"}), true),
        ("event_dst_port == 8080", json!({"event_dst_port": 8080}), true),
        ("event_dst_port == true", json!({"event_dst_port": true}), true),
        (r#"event-dst-port contains "80""#, json!({"event-dst-port": "8080"}), true),
        (
            r#"event-dst-port == "80" && event_name endsWith "xxxxxxxxxx""#,
            json!({"event-dst-port": "80", "event_name": "aaaaxxxxxxxxxx"}),
            true,
        ),
        (r#"((event-dst-port contains "80"))"#, json!({"event-dst-port": "8080"}), true),
        (
            r#"((event-dst-port regexp "^(\\d{3})$"))"#,
            json!({"event-dst-port": "8080"}),
            false,
        ),
        (
            r#"((event-dst-port regexp "^(\\d{4})$"))"#,
            json!({"event-dst-port": "8080"}),
            true,
        ),
        (
            r#"((event-dst-port regexp "^(.*)$"))"#,
            json!({"event-dst-port": "8080"}),
            true,
        ),
    ];

    for (input, parameters, expected) in cases {
        let rule = RuleExpression::new(input);
        assert!(rule.is_valid(), "input: {}", input);
        assert_eq!(
            rule.evaluate(&params(parameters)).unwrap(),
            expected,
            "input: {}",
            input
        );
    }
}

#[test]
fn test_evaluate_mixed_expression() {
    let rule = RuleExpression::new(MIXED);
    let result = rule
        .evaluate(&params(json!({
            "aaa": 10,
            "hello": false,
            "_term": "2012-06-01",
            "asdf": false,
            "abe": 1
        })))
        .unwrap();
    // aaa == 10 && hello != true 已满足
    assert!(result);

    let result = rule
        .evaluate(&params(json!({
            "aaa": 1,
            "hello": true,
            "_term": "2013-01-01",
            "asdf": false,
            "abe": 10
        })))
        .unwrap();
    assert!(result);

    let result = rule
        .evaluate(&params(json!({
            "aaa": 1,
            "hello": true,
            "_term": "2013-01-01",
            "asdf": false,
            "abe": 11
        })))
        .unwrap();
    assert!(!result);
}

#[test]
fn test_evaluate_errors() {
    let rule = RuleExpression::new(r#"event_name endsWith "x""#);
    let err = rule.evaluate(&params(json!({}))).unwrap_err();
    assert!(matches!(err, RuleError::FieldNotFound(_)));
    assert!(err.is_evaluation());

    let err = rule.evaluate(&params(json!({"event_name": 1}))).unwrap_err();
    assert!(err.is_evaluation());

    assert!(
        rule.evaluate(&params(json!({"event_name": "x", "other": 1})))
            .unwrap()
    );

    let invalid = RuleExpression::new("event_name endsWith");
    let err = invalid.evaluate(&params(json!({"event_name": "x"}))).unwrap_err();
    assert!(matches!(err, RuleError::InvalidExpression(expression) if expression == "event_name endsWith"));
}

#[test]
fn test_invalid_regex_is_compile_error() {
    let rule = RuleExpression::new("a regexp '('");
    assert!(rule.is_valid());
    assert!(matches!(rule.compile_error(), Some(RuleError::CompileError(_))));

    let err = rule.evaluate(&params(json!({"a": "x"}))).unwrap_err();
    assert!(matches!(err, RuleError::EvaluationError(_)));
}

#[test]
fn test_trailing_backslash_literal_fails_to_compile() {
    // 末尾反斜杠会转义求值语法中的结束引号
    let rule = RuleExpression::new(r"a == 'x\'");
    assert!(rule.is_valid());
    assert_eq!(rule.expression_valuate(), r"a == 'x\'");
    assert!(matches!(rule.compile_error(), Some(RuleError::CompileError(_))));
    assert_eq!(rule.expression_sql(), "a = ?");
    assert_eq!(rule.parameters_sql(), [json!(r"x\")]);

    let escaped = RuleExpression::new(r"a == 'x\\'");
    assert!(escaped.compile_error().is_none());
    assert!(escaped.evaluate(&params(json!({"a": r"x\"}))).unwrap());
}

// ==================== 长表达式测试 ====================

#[test]
fn test_long_and_chain() {
    let expression = vec!["a == 1"; 10_000].join(" && ");
    let rule = RuleExpression::new(expression);
    assert!(rule.is_valid());
    assert!(rule.compile_error().is_none());
    assert_eq!(rule.identities(), ["a"]);
    assert_eq!(rule.parameters_sql().len(), 10_000);
    assert_eq!(rule.ast_root().unwrap().depth(), 10_001);

    assert!(rule.evaluate(&params(json!({"a": 1}))).unwrap());
    assert!(!rule.evaluate(&params(json!({"a": 2}))).unwrap());
}

#[test]
fn test_long_or_chain() {
    let mut clauses = vec!["a == 1"; 10_000];
    clauses.push("b == 'hit'");
    let rule = RuleExpression::new(clauses.join(" || "));
    assert!(rule.is_valid());
    assert_eq!(rule.identities(), ["a", "b"]);

    assert!(rule.evaluate(&params(json!({"a": 2, "b": "hit"}))).unwrap());
    assert!(!rule.evaluate(&params(json!({"a": 2, "b": "miss"}))).unwrap());
    assert!(rule.evaluate(&params(json!({"a": 1}))).unwrap());
}

// ==================== 语法树测试 ====================

#[test]
fn test_ast_shape() {
    let rule = RuleExpression::new(r#"event_dst_port == "80""#);
    let root = rule.ast_root().unwrap();
    assert_eq!(root.kind, TokenKind::Comparator);
    assert!(root.left.as_ref().unwrap().is_leaf());
    assert!(root.right.as_ref().unwrap().is_leaf());

    let expected = json!({
        "kind": "logical_op",
        "value": "&&",
        "left": {
            "kind": "comparator",
            "value": "==",
            "left": {"kind": "identity", "value": "event-dst-port", "left": null, "right": null},
            "right": {"kind": "string", "value": "80", "left": null, "right": null}
        },
        "right": {
            "kind": "comparator",
            "value": "endsWith",
            "left": {"kind": "identity", "value": "event_name", "left": null, "right": null},
            "right": {"kind": "string", "value": "xxxxxxxxxx", "left": null, "right": null}
        }
    });

    for input in [
        r#"event-dst-port == "80" && event_name endsWith "xxxxxxxxxx""#,
        r#"(event-dst-port == "80") && event_name endsWith "xxxxxxxxxx""#,
        r#"((event-dst-port == "80") && event_name endsWith "xxxxxxxxxx")"#,
        r#"((event-dst-port == "80") && (event_name endsWith "xxxxxxxxxx"))"#,
    ] {
        let rule = RuleExpression::new(input);
        assert_eq!(
            serde_json::to_value(rule.ast_root()).unwrap(),
            expected,
            "input: {}",
            input
        );
    }
}

#[test]
fn test_ast_without_logic_is_single_comparator() {
    for input in ["a == 1", "b-c contains 'x'", "d regexp '^e$'", "f <= '2012-01-01'"] {
        let rule = RuleExpression::new(input);
        let root = rule.ast_root().unwrap();
        assert_eq!(root.kind, TokenKind::Comparator, "input: {}", input);
        assert_eq!(root.depth(), 2);
    }
}

// ==================== 变量校验测试 ====================

#[test]
fn test_validate_identities() {
    let rule = RuleExpression::new(r#"event-dst-port == "80" && event_name endsWith "x""#);
    assert!(rule.validate_identities(&["event-dst-port", "event_name"]));
    assert!(rule.validate_identities(&["event_name", "event-dst-port", "extra"]));
    assert!(!rule.validate_identities(&["event_name"]));
    assert!(!rule.validate_identities::<&str>(&[]));
}

// ==================== 幂等性与限制测试 ====================

#[test]
fn test_construction_is_idempotent() {
    for input in [MIXED, "((_term >= '2012-12-22')) && abe == 10", "()", "a =="] {
        let first = RuleExpression::new(input);
        let second = RuleExpression::new(input);
        assert_eq!(first.is_valid(), second.is_valid());
        assert_eq!(first.identities(), second.identities());
        assert_eq!(first.expression_sql(), second.expression_sql());
        assert_eq!(first.ast_root(), second.ast_root());
    }
}

#[test]
fn test_deep_nesting_is_bounded() {
    let deep = format!("{}a == 1{}", "(".repeat(200), ")".repeat(200));
    let rule = RuleExpression::new(deep.as_str());
    assert!(!rule.is_valid());
    assert!(rule.ast_root().is_none());

    let rule = RuleExpression::with_limits(deep, CompilerLimits::with_max_nesting_depth(256));
    assert!(rule.is_valid());
    assert!(rule.evaluate(&params(json!({"a": 1}))).unwrap());
}

#[test]
fn test_shared_across_threads() {
    let rule = std::sync::Arc::new(RuleExpression::new(r#"name contains "x""#));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let rule = rule.clone();
            std::thread::spawn(move || {
                let name = if i % 2 == 0 { "xyz" } else { "abc" };
                rule.evaluate(&params(json!({ "name": name }))).unwrap()
            })
        })
        .collect();

    let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, [true, false, true, false]);
}
