//! 表达式分词器
//!
//! 基于状态转移表逐段匹配表达式字符串：
//! 当前分词类型决定下一个分词允许的类型及其优先级，
//! 各类型按顺序尝试匹配，最先命中的类型生效。
//!
//! 匹配优先级：
//! 1. 空白字符
//! 2. 左右括号
//! 3. 逻辑、比较运算符
//! 4. 变量名
//! 5. 字符串、数字、布尔值
//! 6. 剩余任意内容，标记为未匹配

use crate::config::CompilerLimits;
use crate::token::{Comparator, Token, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, trace};

/// 各分词类型对应的正则表达式，均锚定在剩余字符串开头
static TOKEN_PATTERNS: Lazy<HashMap<TokenKind, Regex>> = Lazy::new(|| {
    [
        (TokenKind::LeftBracket, r"^\("),
        (TokenKind::RightBracket, r"^\)"),
        (TokenKind::LogicalOp, r"^(&&|\|\|)"),
        (
            TokenKind::Comparator,
            r"^(==|!=|>=|<=|>|<|contains|notContains|startsWith|notStartsWith|endsWith|notEndsWith|regexp)",
        ),
        (TokenKind::Identity, r"^[a-zA-Z_][a-zA-Z0-9_.\-]*"),
        (TokenKind::String, r#"^('.*?'|".*?")"#),
        (TokenKind::Number, r"^[+-]?[0-9]+(?:\.[0-9]+)?"),
        (TokenKind::Bool, r"^(true|false)"),
        (TokenKind::Space, r"^\s+"),
        (TokenKind::NoMatch, r"(?s)^.+"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("内置分词正则无效")))
    .collect()
});

/// 各分词类型之后允许出现的分词类型，顺序即匹配优先级
const TRANSITIONS: &[(TokenKind, &[TokenKind])] = &[
    (
        TokenKind::Begin,
        &[TokenKind::Space, TokenKind::LeftBracket, TokenKind::Identity, TokenKind::NoMatch],
    ),
    (
        TokenKind::LeftBracket,
        &[TokenKind::Space, TokenKind::LeftBracket, TokenKind::Identity, TokenKind::NoMatch],
    ),
    (
        TokenKind::RightBracket,
        &[
            TokenKind::Space,
            TokenKind::LogicalOp,
            TokenKind::RightBracket,
            TokenKind::NoMatch,
            TokenKind::End,
        ],
    ),
    (
        TokenKind::LogicalOp,
        &[TokenKind::Space, TokenKind::LeftBracket, TokenKind::Identity, TokenKind::NoMatch],
    ),
    (
        TokenKind::Comparator,
        &[
            TokenKind::Space,
            TokenKind::String,
            TokenKind::Number,
            TokenKind::Bool,
            TokenKind::NoMatch,
        ],
    ),
    (
        TokenKind::Identity,
        &[TokenKind::Space, TokenKind::Comparator, TokenKind::NoMatch],
    ),
    (
        TokenKind::String,
        &[
            TokenKind::Space,
            TokenKind::LogicalOp,
            TokenKind::RightBracket,
            TokenKind::NoMatch,
            TokenKind::End,
        ],
    ),
    (
        TokenKind::Number,
        &[
            TokenKind::Space,
            TokenKind::LogicalOp,
            TokenKind::RightBracket,
            TokenKind::NoMatch,
            TokenKind::End,
        ],
    ),
    (
        TokenKind::Bool,
        &[
            TokenKind::Space,
            TokenKind::LogicalOp,
            TokenKind::RightBracket,
            TokenKind::NoMatch,
            TokenKind::End,
        ],
    ),
];

/// 获取某分词类型之后允许的分词类型
pub fn next_kinds(kind: TokenKind) -> &'static [TokenKind] {
    TRANSITIONS
        .iter()
        .find(|(from, _)| *from == kind)
        .map(|(_, next)| *next)
        .unwrap_or(&[])
}

/// 分词结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LexOutput {
    /// 按出现顺序排列的分词（不含空白）
    pub tokens: Vec<Token>,
    /// 去重后的变量名，保持首次出现顺序
    pub identities: Vec<String>,
    /// 表达式是否完整有效
    pub valid: bool,
}

/// 表达式分词器
#[derive(Debug, Clone, Default)]
pub struct Lexer {
    limits: CompilerLimits,
}

impl Lexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: CompilerLimits) -> Self {
        Self { limits }
    }

    /// 解析表达式字符串
    ///
    /// 不会返回错误：无法识别的剩余内容整体生成一个 `NoMatch` 分词并标记为无效。
    /// 括号未闭合、或结尾停在不允许结束的位置（如比较运算符之后）同样标记为无效。
    pub fn tokenize(&self, input: &str) -> LexOutput {
        let mut output = LexOutput {
            valid: true,
            ..Default::default()
        };

        let mut current = TokenKind::Begin;
        let mut current_comparator = None;
        let mut unmatched_left_bracket = 0usize;
        let mut rest = input;

        while !rest.is_empty() {
            let (kind, matched) =
                self.match_next(current, current_comparator, unmatched_left_bracket, rest);

            let matched = match kind {
                TokenKind::LeftBracket if unmatched_left_bracket >= self.limits.max_nesting_depth => {
                    debug!(
                        limit = self.limits.max_nesting_depth,
                        "括号嵌套层级超过上限"
                    );
                    output.tokens.push(Token::new(TokenKind::NoMatch, rest));
                    output.valid = false;
                    break;
                }
                TokenKind::NoMatch => {
                    trace!(rest = %rest, "剩余内容未匹配任何分词类型");
                    output.tokens.push(Token::new(TokenKind::NoMatch, rest));
                    output.valid = false;
                    break;
                }
                _ => matched,
            };

            rest = &rest[matched.len()..];
            if kind == TokenKind::Space {
                continue;
            }

            match kind {
                TokenKind::LeftBracket => unmatched_left_bracket += 1,
                TokenKind::RightBracket => unmatched_left_bracket -= 1,
                _ => {}
            }

            let value = if kind == TokenKind::String {
                &matched[1..matched.len() - 1]
            } else {
                matched
            };
            trace!(kind = %kind, value = %value, "分词匹配成功");

            let token = Token::new(kind, value);
            if kind == TokenKind::Identity && !output.identities.iter().any(|v| v == value) {
                output.identities.push(value.to_string());
            }
            current_comparator = token.comparator();
            current = kind;
            output.tokens.push(token);
        }

        if output.valid && !output.tokens.is_empty() {
            if unmatched_left_bracket != 0 {
                debug!(unmatched_left_bracket, "存在未闭合的左括号");
                output.valid = false;
            } else if !next_kinds(current).contains(&TokenKind::End) {
                debug!(last = %current, "表达式在不允许结束的位置结束");
                output.valid = false;
            }
        }

        debug!(
            tokens = output.tokens.len(),
            valid = output.valid,
            "表达式分词完成"
        );
        output
    }

    /// 按转移表优先级尝试匹配下一个分词，全部失败时返回 `NoMatch`
    fn match_next<'a>(
        &self,
        current: TokenKind,
        comparator: Option<Comparator>,
        unmatched_left_bracket: usize,
        rest: &'a str,
    ) -> (TokenKind, &'a str) {
        for &kind in next_kinds(current) {
            // 没有未闭合的左括号时，不匹配右括号
            if kind == TokenKind::RightBracket && unmatched_left_bracket == 0 {
                continue;
            }
            if let Some(comparator) = comparator {
                // 字符串函数与正则只接受字符串
                if comparator.accepts_only_strings()
                    && matches!(kind, TokenKind::Bool | TokenKind::Number)
                {
                    continue;
                }
                // 大小比较不接受布尔值，日期字符串可以
                if comparator.is_ordering() && kind == TokenKind::Bool {
                    continue;
                }
            }

            let Some(pattern) = TOKEN_PATTERNS.get(&kind) else {
                continue;
            };
            if let Some(m) = pattern.find(rest) {
                return (kind, m.as_str());
            }
        }
        (TokenKind::NoMatch, rest)
    }
}

/// 使用默认限制解析表达式字符串
pub fn tokenize(input: &str) -> LexOutput {
    Lexer::new().tokenize(input)
}
