//! 求值语法解析
//!
//! 运算符优先级（由低到高）：`||`、`&&`、比较运算符、一元运算符 `!` `-` `+`。

use super::functions::FunctionRegistry;
use super::lexer::{CompareOp, ValuateToken};
use super::value::ValuateValue;
use crate::error::{Result, RuleError};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// 表达式节点
#[derive(Debug, Clone)]
pub enum Node {
    Literal(ValuateValue),
    Variable(String),
    Call {
        name: String,
        args: Vec<Node>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Compare {
        op: CompareOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// 右侧为字符串字面量的正则匹配，编译期预先构建正则
    RegexMatch {
        negate: bool,
        operand: Box<Node>,
        pattern: Regex,
    },
    /// 同一运算符连接的多个操作数，按顺序短路求值
    Logic { op: LogicOp, operands: Vec<Node> },
}

impl Node {
    /// 收集引用的变量名（去重，保持出现顺序）
    pub fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Self::Literal(_) => {}
            Self::Variable(name) => {
                if !vars.contains(name) {
                    vars.push(name.clone());
                }
            }
            Self::Call { args, .. } => args.iter().for_each(|a| a.collect_variables(vars)),
            Self::Unary { operand, .. } | Self::RegexMatch { operand, .. } => {
                operand.collect_variables(vars)
            }
            Self::Compare { left, right, .. } => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
            Self::Logic { operands, .. } => operands.iter().for_each(|o| o.collect_variables(vars)),
        }
    }
}

pub struct ValuateParser<'a> {
    tokens: Vec<ValuateToken>,
    position: usize,
    functions: &'a FunctionRegistry,
    depth: usize,
    max_depth: usize,
}

impl<'a> ValuateParser<'a> {
    pub fn new(tokens: Vec<ValuateToken>, functions: &'a FunctionRegistry, max_depth: usize) -> Self {
        Self {
            tokens,
            position: 0,
            functions,
            depth: 0,
            max_depth,
        }
    }

    /// 解析完整表达式，空输入返回 `None`
    pub fn parse(mut self) -> Result<Option<Node>> {
        if self.tokens.is_empty() {
            return Ok(None);
        }
        let node = self.parse_or()?;
        if let Some(token) = self.current() {
            return Err(RuleError::CompileError(format!(
                "表达式末尾存在多余内容: {:?}",
                token
            )));
        }
        Ok(Some(node))
    }

    fn current(&self) -> Option<&ValuateToken> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<ValuateToken> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn expect(&mut self, expected: ValuateToken) -> Result<()> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(RuleError::CompileError(format!(
                "期望 {:?}, 实际 {:?}",
                expected, token
            ))),
            None => Err(RuleError::CompileError(format!(
                "期望 {:?}, 表达式已结束",
                expected
            ))),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(RuleError::NestingTooDeep {
                depth: self.depth,
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut operands = vec![self.parse_and()?];
        while self.current() == Some(&ValuateToken::Or) {
            self.advance();
            operands.push(self.parse_and()?);
        }
        Ok(logic(LogicOp::Or, operands))
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut operands = vec![self.parse_comparison()?];
        while self.current() == Some(&ValuateToken::And) {
            self.advance();
            operands.push(self.parse_comparison()?);
        }
        Ok(logic(LogicOp::And, operands))
    }

    fn parse_comparison(&mut self) -> Result<Node> {
        let left = self.parse_unary()?;
        let Some(ValuateToken::Compare(op)) = self.current().cloned() else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_unary()?;

        match (op, right) {
            (CompareOp::Match | CompareOp::NotMatch, Node::Literal(ValuateValue::String(pattern))) => {
                let regex = Regex::new(&pattern).map_err(|e| {
                    RuleError::CompileError(format!("无效的正则表达式 '{}': {}", pattern, e))
                })?;
                Ok(Node::RegexMatch {
                    negate: op == CompareOp::NotMatch,
                    operand: Box::new(left),
                    pattern: regex,
                })
            }
            (op, right) => Ok(Node::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            }),
        }
    }

    fn parse_unary(&mut self) -> Result<Node> {
        let op = match self.current() {
            Some(ValuateToken::Not) => UnaryOp::Not,
            Some(ValuateToken::Minus) => UnaryOp::Negate,
            Some(ValuateToken::Plus) => UnaryOp::Plus,
            _ => return self.parse_primary(),
        };
        self.advance();
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        Ok(Node::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn parse_primary(&mut self) -> Result<Node> {
        match self.advance() {
            Some(ValuateToken::Number(n)) => Ok(Node::Literal(ValuateValue::Number(n))),
            Some(ValuateToken::String(s)) => Ok(Node::Literal(ValuateValue::String(s))),
            Some(ValuateToken::Bool(b)) => Ok(Node::Literal(ValuateValue::Bool(b))),
            Some(ValuateToken::Variable(name)) => Ok(Node::Variable(name)),
            Some(ValuateToken::Function(name)) => self.parse_call(name),
            Some(ValuateToken::LeftParen) => {
                self.enter()?;
                let node = self.parse_or();
                self.leave();
                let node = node?;
                self.expect(ValuateToken::RightParen)?;
                Ok(node)
            }
            Some(token) => Err(RuleError::CompileError(format!(
                "意外的分词: {:?}",
                token
            ))),
            None => Err(RuleError::CompileError("表达式意外结束".to_string())),
        }
    }

    fn parse_call(&mut self, name: String) -> Result<Node> {
        if !self.functions.contains(&name) {
            return Err(RuleError::CompileError(format!("未注册的函数: {}", name)));
        }
        self.expect(ValuateToken::LeftParen)?;

        let mut args = Vec::new();
        if self.current() == Some(&ValuateToken::RightParen) {
            self.advance();
            return Ok(Node::Call { name, args });
        }

        self.enter()?;
        let result = loop {
            match self.parse_or() {
                Ok(arg) => args.push(arg),
                Err(e) => break Err(e),
            }
            match self.advance() {
                Some(ValuateToken::Comma) => continue,
                Some(ValuateToken::RightParen) => break Ok(()),
                Some(token) => {
                    break Err(RuleError::CompileError(format!(
                        "函数 {} 参数列表中意外的分词: {:?}",
                        name, token
                    )));
                }
                None => {
                    break Err(RuleError::CompileError(format!(
                        "函数 {} 缺少右括号",
                        name
                    )));
                }
            }
        };
        self.leave();
        result?;

        Ok(Node::Call { name, args })
    }
}

fn logic(op: LogicOp, mut operands: Vec<Node>) -> Node {
    if operands.len() == 1 {
        return operands.swap_remove(0);
    }
    Node::Logic { op, operands }
}
