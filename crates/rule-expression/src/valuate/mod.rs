//! 求值语法转换与编译
//!
//! 将分词数组改写为可直接求值的表达式字符串：
//! - 包含 `-` 的变量名改写为 `[name]`
//! - 字符串字面量统一使用单引号
//! - `contains` 等通配比较改写为函数调用 `contains(name, 'value')`
//! - `regexp` 改写为 `=~`
//!
//! 字符串经 [`compile`] 解析为 [`EvaluableExpression`] 后即可多次求值。

pub mod evaluable;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

pub use evaluable::EvaluableExpression;
pub use functions::{ExpressionFunction, FunctionRegistry};
pub use value::ValuateValue;

use crate::config::CompilerLimits;
use crate::error::Result;
use crate::token::{Comparator, Token, TokenKind};

/// 改写分词数组，通配比较的三个分词合并为一个函数调用分词
pub fn to_valuate_tokens(tokens: &[Token]) -> Vec<Token> {
    let mut result = Vec::with_capacity(tokens.len());
    let mut index = 0;

    while index < tokens.len() {
        let token = &tokens[index];
        index += 1;

        match token.kind {
            TokenKind::Identity => {
                let name = escape_identity(&token.value);
                let comparator = tokens.get(index).and_then(Token::comparator);
                let literal = tokens.get(index + 1).filter(|t| t.kind.is_literal());

                match (comparator, literal) {
                    (Some(comparator), Some(literal)) if comparator.is_wildcard() => {
                        let call = format!(
                            "{}({}, {})",
                            comparator.as_str(),
                            name,
                            quote(&normalize_quotes(literal))
                        );
                        result.push(Token::new(TokenKind::SubExpression, call));
                        index += 2;
                    }
                    _ => result.push(Token::new(TokenKind::Identity, name)),
                }
            }
            TokenKind::Comparator if token.comparator() == Some(Comparator::Regexp) => {
                result.push(Token::new(TokenKind::Comparator, "=~"));
            }
            TokenKind::String => {
                result.push(Token::new(TokenKind::String, normalize_quotes(token)));
            }
            _ => result.push(token.clone()),
        }
    }

    result
}

/// 以空格连接改写后的分词，字符串字面量加上单引号
pub fn to_valuate_syntax(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|token| match token.kind {
            TokenKind::String => quote(&token.value),
            _ => token.value.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 编译求值语法，注册 `contains` 等字符串判断函数
pub fn compile(syntax: &str) -> Result<EvaluableExpression> {
    compile_with_limits(syntax, &CompilerLimits::default())
}

pub fn compile_with_limits(syntax: &str, limits: &CompilerLimits) -> Result<EvaluableExpression> {
    EvaluableExpression::with_limits(syntax, FunctionRegistry::predicates(), limits)
}

fn escape_identity(name: &str) -> String {
    if name.contains('-') {
        format!("[{}]", name)
    } else {
        name.to_string()
    }
}

/// 字符串中的双引号替换为单引号，其他字面量保持原样
fn normalize_quotes(token: &Token) -> String {
    if token.kind == TokenKind::String {
        token.value.replace('"', "'")
    } else {
        token.value.clone()
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "\\'"))
}
