//! 分词类型与比较运算符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 分词类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// 起始状态，不会出现在分词结果中
    Begin,
    /// 结束状态，仅用于转移表中标记可以结束的位置
    End,
    LeftBracket,
    RightBracket,
    /// 逻辑运算符 `&&` `||`
    LogicalOp,
    /// 比较运算符，如 `==` `contains` `regexp`
    Comparator,
    /// 变量名
    Identity,
    String,
    Number,
    Bool,
    /// 空白字符，匹配后直接丢弃
    Space,
    /// 无法匹配的剩余内容
    NoMatch,
    /// 括号折叠后的子表达式
    SubExpression,
}

impl TokenKind {
    /// 是否为字面量类型（字符串、数字、布尔值）
    pub fn is_literal(self) -> bool {
        matches!(self, Self::String | Self::Number | Self::Bool)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Begin => "begin",
            Self::End => "end",
            Self::LeftBracket => "left_bracket",
            Self::RightBracket => "right_bracket",
            Self::LogicalOp => "logical_op",
            Self::Comparator => "comparator",
            Self::Identity => "identity",
            Self::String => "string",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Space => "space",
            Self::NoMatch => "no_match",
            Self::SubExpression => "sub_expression",
        };
        write!(f, "{}", s)
    }
}

/// 分词结果
///
/// `value` 为匹配到的原始文本，字符串字面量已去除两侧引号；
/// `children` 仅在括号折叠生成的 [`TokenKind::SubExpression`] 中有内容。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Token>,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            children: Vec::new(),
        }
    }

    pub fn sub_expression(children: Vec<Token>) -> Self {
        Self {
            kind: TokenKind::SubExpression,
            value: String::new(),
            children,
        }
    }

    /// 当前分词为比较运算符时返回对应的 [`Comparator`]
    pub fn comparator(&self) -> Option<Comparator> {
        if self.kind == TokenKind::Comparator {
            Comparator::parse(&self.value)
        } else {
            None
        }
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Neq,
    Gte,
    Lte,
    Gt,
    Lt,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Regexp,
}

impl Comparator {
    pub fn parse(s: &str) -> Option<Self> {
        let comparator = match s {
            "==" => Self::Eq,
            "!=" => Self::Neq,
            ">=" => Self::Gte,
            "<=" => Self::Lte,
            ">" => Self::Gt,
            "<" => Self::Lt,
            "contains" => Self::Contains,
            "notContains" => Self::NotContains,
            "startsWith" => Self::StartsWith,
            "notStartsWith" => Self::NotStartsWith,
            "endsWith" => Self::EndsWith,
            "notEndsWith" => Self::NotEndsWith,
            "regexp" => Self::Regexp,
            _ => return None,
        };
        Some(comparator)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Contains => "contains",
            Self::NotContains => "notContains",
            Self::StartsWith => "startsWith",
            Self::NotStartsWith => "notStartsWith",
            Self::EndsWith => "endsWith",
            Self::NotEndsWith => "notEndsWith",
            Self::Regexp => "regexp",
        }
    }

    /// 子串/前缀/后缀匹配类函数（SQL 中转为 LIKE）
    pub fn is_wildcard(self) -> bool {
        matches!(
            self,
            Self::Contains
                | Self::NotContains
                | Self::StartsWith
                | Self::NotStartsWith
                | Self::EndsWith
                | Self::NotEndsWith
        )
    }

    /// 只接受字符串字面量的运算符
    pub fn accepts_only_strings(self) -> bool {
        self.is_wildcard() || self == Self::Regexp
    }

    /// 大小比较运算符，不接受布尔值
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Gte | Self::Lte | Self::Gt | Self::Lt)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 逻辑运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "&&" => Some(Self::And),
            "||" => Some(Self::Or),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// SQL 关键字形式
impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// 将分词数组还原为表达式字符串
///
/// 分词之间以单个空格连接；字符串字面量默认使用单引号，
/// 内容包含单引号时改用双引号。
pub fn tokens_to_expression(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|token| match token.kind {
            TokenKind::String => quote_literal(&token.value),
            TokenKind::SubExpression => format!("( {} )", tokens_to_expression(&token.children)),
            _ => token.value.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_literal(value: &str) -> String {
    let quote = if value.contains('\'') { '"' } else { '\'' };
    format!("{quote}{value}{quote}")
}
