//! SQL 转换
//!
//! 将分词数组改写为带 `?` 占位符的 SQL 条件片段，并按顺序提取参数值。

use crate::token::{Comparator, LogicalOperator, Token, TokenKind};
use serde::Serialize;
use serde_json::Value;

/// SQL 预编译语句片段及其参数
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SqlQuery {
    /// 以空格连接的 SQL 条件片段
    pub fragment: String,
    /// 与占位符一一对应的参数值
    pub parameters: Vec<Value>,
    /// 改写后的分词数组
    #[serde(skip)]
    pub tokens: Vec<Token>,
}

/// 将分词数组转换为 SQL 条件片段
///
/// - `&&` / `||` 转为 `AND` / `OR`
/// - `==` 转为 `=`，`regexp` 转为 `REGEXP`
/// - `contains` / `startsWith` / `endsWith` 转为 `LIKE`，`not*` 转为 `NOT LIKE`，
///   其后的值转为 `concat('%', ?, '%')` 等形式
/// - 其余字面量替换为占位符 `?`
pub fn to_sql(tokens: &[Token]) -> SqlQuery {
    let mut sql_tokens = tokens.to_vec();
    let mut parameters = Vec::new();
    let mut wildcard: Option<Comparator> = None;

    for token in sql_tokens.iter_mut() {
        match token.kind {
            TokenKind::LogicalOp => {
                if let Some(operator) = LogicalOperator::parse(&token.value) {
                    token.value = operator.to_string();
                }
            }
            TokenKind::Comparator => {
                let Some(comparator) = Comparator::parse(&token.value) else {
                    continue;
                };
                token.value = sql_comparator(comparator).to_string();
                wildcard = comparator.is_wildcard().then_some(comparator);
            }
            TokenKind::String | TokenKind::Number | TokenKind::Bool => {
                parameters.push(sql_parameter(token));
                token.value = match wildcard.take() {
                    Some(comparator) => like_pattern(comparator).to_string(),
                    None => "?".to_string(),
                };
            }
            _ => {}
        }
    }

    let fragment = sql_tokens
        .iter()
        .map(|t| t.value.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    SqlQuery {
        fragment,
        parameters,
        tokens: sql_tokens,
    }
}

fn sql_comparator(comparator: Comparator) -> &'static str {
    match comparator {
        Comparator::Eq => "=",
        Comparator::Contains | Comparator::StartsWith | Comparator::EndsWith => "LIKE",
        Comparator::NotContains | Comparator::NotStartsWith | Comparator::NotEndsWith => {
            "NOT LIKE"
        }
        Comparator::Regexp => "REGEXP",
        other => other.as_str(),
    }
}

fn like_pattern(comparator: Comparator) -> &'static str {
    match comparator {
        Comparator::Contains | Comparator::NotContains => "concat('%', ?, '%')",
        Comparator::StartsWith | Comparator::NotStartsWith => "concat(?, '%')",
        _ => "concat('%', ?)",
    }
}

/// 按字面量类型转换参数值，无法解析的数字和布尔值保留为原始字符串
fn sql_parameter(token: &Token) -> Value {
    match token.kind {
        TokenKind::Bool => token
            .value
            .parse::<bool>()
            .map(Value::Bool)
            .unwrap_or_else(|_| Value::String(token.value.clone())),
        TokenKind::Number => token
            .value
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(token.value.clone())),
        _ => Value::String(token.value.clone()),
    }
}
