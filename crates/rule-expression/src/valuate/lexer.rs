//! 求值语法分词

use crate::error::{Result, RuleError};

/// 二元比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Match,
    NotMatch,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Match => "=~",
            Self::NotMatch => "!~",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValuateToken {
    Number(f64),
    String(String),
    Bool(bool),
    Variable(String),
    Function(String),
    LeftParen,
    RightParen,
    Comma,
    Compare(CompareOp),
    And,
    Or,
    Not,
    Minus,
    Plus,
}

pub struct ValuateLexer {
    input: Vec<char>,
    position: usize,
}

impl ValuateLexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn error(&self, message: impl Into<String>) -> RuleError {
        RuleError::CompileError(format!("位置 {}: {}", self.position, message.into()))
    }

    /// 读取全部分词
    pub fn tokenize(mut self) -> Result<Vec<ValuateToken>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<ValuateToken>> {
        self.skip_whitespace();

        let Some(ch) = self.current_char() else {
            return Ok(None);
        };

        let token = match ch {
            '(' => self.single(ValuateToken::LeftParen),
            ')' => self.single(ValuateToken::RightParen),
            ',' => self.single(ValuateToken::Comma),
            '+' => self.single(ValuateToken::Plus),
            '-' => self.single(ValuateToken::Minus),
            '\'' | '"' => ValuateToken::String(self.read_string(ch)?),
            '[' => ValuateToken::Variable(self.read_escaped_variable()?),
            '&' => self.double('&', ValuateToken::And)?,
            '|' => self.double('|', ValuateToken::Or)?,
            '=' => match self.peek_char(1) {
                Some('=') => self.pair(ValuateToken::Compare(CompareOp::Eq)),
                Some('~') => self.pair(ValuateToken::Compare(CompareOp::Match)),
                _ => return Err(self.error("'=' 之后需要 '=' 或 '~'")),
            },
            '!' => match self.peek_char(1) {
                Some('=') => self.pair(ValuateToken::Compare(CompareOp::Neq)),
                Some('~') => self.pair(ValuateToken::Compare(CompareOp::NotMatch)),
                _ => self.single(ValuateToken::Not),
            },
            '>' => match self.peek_char(1) {
                Some('=') => self.pair(ValuateToken::Compare(CompareOp::Gte)),
                _ => self.single(ValuateToken::Compare(CompareOp::Gt)),
            },
            '<' => match self.peek_char(1) {
                Some('=') => self.pair(ValuateToken::Compare(CompareOp::Lte)),
                _ => self.single(ValuateToken::Compare(CompareOp::Lt)),
            },
            c if c.is_ascii_digit() => self.read_number()?,
            c if c.is_alphabetic() || c == '_' => self.read_word(),
            other => return Err(self.error(format!("无法识别的字符 '{}'", other))),
        };

        Ok(Some(token))
    }

    fn single(&mut self, token: ValuateToken) -> ValuateToken {
        self.advance();
        token
    }

    fn pair(&mut self, token: ValuateToken) -> ValuateToken {
        self.advance();
        self.advance();
        token
    }

    fn double(&mut self, ch: char, token: ValuateToken) -> Result<ValuateToken> {
        if self.peek_char(1) == Some(ch) {
            Ok(self.pair(token))
        } else {
            Err(self.error(format!("'{}' 之后需要 '{}'", ch, ch)))
        }
    }

    /// 读取字符串，反斜杠转义其后的任意字符
    fn read_string(&mut self, quote: char) -> Result<String> {
        let mut result = String::new();
        self.advance();

        while let Some(ch) = self.current_char() {
            self.advance();
            match ch {
                c if c == quote => return Ok(result),
                '\\' => match self.current_char() {
                    Some(escaped) => {
                        result.push(escaped);
                        self.advance();
                    }
                    None => break,
                },
                c => result.push(c),
            }
        }

        Err(self.error("字符串缺少结束引号"))
    }

    /// 读取 `[name]` 形式的变量名
    fn read_escaped_variable(&mut self) -> Result<String> {
        let mut result = String::new();
        self.advance();

        while let Some(ch) = self.current_char() {
            self.advance();
            if ch == ']' {
                return Ok(result);
            }
            result.push(ch);
        }

        Err(self.error("变量名缺少结束的 ']'"))
    }

    fn read_number(&mut self) -> Result<ValuateToken> {
        let start = self.position;
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.current_char() == Some('.') && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
        {
            self.advance();
            while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text: String = self.input[start..self.position].iter().collect();
        text.parse::<f64>()
            .map(ValuateToken::Number)
            .map_err(|e| self.error(format!("无效的数字 '{}': {}", text, e)))
    }

    /// 读取变量名、函数名或布尔值
    fn read_word(&mut self) -> ValuateToken {
        let mut word = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match word.as_str() {
            "true" => return ValuateToken::Bool(true),
            "false" => return ValuateToken::Bool(false),
            _ => {}
        }

        // 名称之后紧跟左括号时视为函数调用
        let mut offset = 0;
        while self.peek_char(offset).is_some_and(char::is_whitespace) {
            offset += 1;
        }
        if self.peek_char(offset) == Some('(') {
            ValuateToken::Function(word)
        } else {
            ValuateToken::Variable(word)
        }
    }
}
