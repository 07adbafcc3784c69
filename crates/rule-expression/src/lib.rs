//! 规则表达式编译器
//!
//! 将形如 `event_dst_port == "80" && event_name endsWith "x"` 的条件表达式
//! 解析为分词数组，并转换为三种可执行形式：
//! - 带占位符的 SQL 条件片段及参数
//! - 可直接求值的表达式（[`valuate`]）
//! - 二叉语法树（[`ast`]）
//!
//! ```
//! use rule_expression::RuleExpression;
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! let rule = RuleExpression::new(r#"event-dst-port contains "80""#);
//! assert!(rule.is_valid());
//! assert_eq!(rule.expression_sql(), "event-dst-port LIKE concat('%', ?, '%')");
//!
//! let params: HashMap<_, _> = [("event-dst-port".to_string(), json!("8080"))].into();
//! assert!(rule.evaluate(&params).unwrap());
//! ```

pub mod ast;
pub mod collapse;
pub mod config;
pub mod error;
pub mod expression;
pub mod lexer;
pub mod sql;
pub mod token;
pub mod valuate;

pub use ast::AstNode;
pub use config::{AppConfig, CompilerLimits};
pub use error::{Result, RuleError};
pub use expression::RuleExpression;
pub use lexer::{LexOutput, Lexer};
pub use sql::SqlQuery;
pub use token::{Comparator, LogicalOperator, Token, TokenKind, tokens_to_expression};
pub use valuate::{EvaluableExpression, FunctionRegistry, ValuateValue};
