//! 括号折叠
//!
//! 将左右括号包围的分词递归折叠为 [`TokenKind::SubExpression`] 分词，
//! 仅用于展示和还原，不参与合法性校验。

use crate::token::{Token, TokenKind};

/// 递归折叠子表达式
///
/// 未闭合的括号及其后续分词原样保留。
pub fn collapse(tokens: &[Token]) -> Vec<Token> {
    let mut result = Vec::with_capacity(tokens.len());
    // 一级子表达式左括号位置
    let mut left_bracket: Option<usize> = None;
    // 子表达式内部的嵌套层级
    let mut depth = 0usize;

    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LeftBracket => match left_bracket {
                None => left_bracket = Some(index),
                Some(_) => depth += 1,
            },
            TokenKind::RightBracket => match left_bracket {
                Some(start) if depth == 0 => {
                    result.push(Token::sub_expression(collapse(&tokens[start + 1..index])));
                    left_bracket = None;
                }
                Some(_) => depth -= 1,
                // 没有对应左括号的右括号
                None => result.push(token.clone()),
            },
            _ => {
                if left_bracket.is_none() {
                    result.push(token.clone());
                }
            }
        }
    }

    if let Some(start) = left_bracket {
        result.extend_from_slice(&tokens[start..]);
    }

    result
}
