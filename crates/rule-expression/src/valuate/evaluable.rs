//! 可执行表达式

use super::functions::FunctionRegistry;
use super::lexer::{CompareOp, ValuateLexer};
use super::parser::{LogicOp, Node, UnaryOp, ValuateParser};
use super::value::ValuateValue;
use crate::config::CompilerLimits;
use crate::error::{Result, RuleError};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// 编译后的求值语法表达式
///
/// 语法只解析一次，之后可以使用不同的参数多次求值，实例本身不可变。
#[derive(Debug, Clone)]
pub struct EvaluableExpression {
    source: String,
    root: Option<Node>,
    functions: FunctionRegistry,
    vars: Vec<String>,
}

impl EvaluableExpression {
    /// 编译不含自定义函数的表达式
    pub fn new(source: &str) -> Result<Self> {
        Self::with_functions(source, FunctionRegistry::new())
    }

    /// 编译表达式并注册自定义函数
    pub fn with_functions(source: &str, functions: FunctionRegistry) -> Result<Self> {
        Self::with_limits(source, functions, &CompilerLimits::default())
    }

    pub fn with_limits(
        source: &str,
        functions: FunctionRegistry,
        limits: &CompilerLimits,
    ) -> Result<Self> {
        let tokens = ValuateLexer::new(source).tokenize()?;
        // 括号与一元运算符共用嵌套计数
        let max_depth = limits.max_nesting_depth.saturating_mul(2).max(1);
        let root = ValuateParser::new(tokens, &functions, max_depth).parse()?;

        let mut vars = Vec::new();
        if let Some(root) = &root {
            root.collect_variables(&mut vars);
        }

        Ok(Self {
            source: source.to_string(),
            root,
            functions,
            vars,
        })
    }

    /// 原始求值语法字符串
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 表达式引用的变量名
    pub fn vars(&self) -> &[String] {
        &self.vars
    }

    /// 使用参数求值，空表达式返回 `Null`
    pub fn evaluate(&self, parameters: &HashMap<String, Value>) -> Result<ValuateValue> {
        match &self.root {
            Some(root) => self.eval_node(root, parameters),
            None => Ok(ValuateValue::Null),
        }
    }

    fn eval_node(&self, node: &Node, parameters: &HashMap<String, Value>) -> Result<ValuateValue> {
        match node {
            Node::Literal(value) => Ok(value.clone()),
            Node::Variable(name) => resolve_variable(name, parameters).map(ValuateValue::from),
            Node::Call { name, args } => {
                let function = self
                    .functions
                    .get(name)
                    .ok_or_else(|| RuleError::EvaluationError(format!("未注册的函数: {}", name)))?;
                let args = args
                    .iter()
                    .map(|arg| self.eval_node(arg, parameters))
                    .collect::<Result<Vec<_>>>()?;
                function(&args)
            }
            Node::Unary { op, operand } => {
                let value = self.eval_node(operand, parameters)?;
                eval_unary(*op, value)
            }
            Node::Compare { op, left, right } => {
                let left = self.eval_node(left, parameters)?;
                let right = self.eval_node(right, parameters)?;
                eval_compare(*op, &left, &right).map(ValuateValue::Bool)
            }
            Node::RegexMatch {
                negate,
                operand,
                pattern,
            } => {
                let value = self.eval_node(operand, parameters)?;
                let subject = expect_string(&value, "=~")?;
                Ok(ValuateValue::Bool(pattern.is_match(subject) != *negate))
            }
            Node::Logic { op, operands } => {
                // 短路求值：&& 遇到 false、|| 遇到 true 即返回
                let stop = *op == LogicOp::Or;
                for operand in operands {
                    if expect_bool(&self.eval_node(operand, parameters)?, *op)? == stop {
                        return Ok(ValuateValue::Bool(stop));
                    }
                }
                Ok(ValuateValue::Bool(!stop))
            }
        }
    }
}

/// 获取变量值：优先按完整名称查找，其次按点号分隔的路径访问嵌套对象（如 "event.type"）
fn resolve_variable<'a>(name: &str, parameters: &'a HashMap<String, Value>) -> Result<&'a Value> {
    if let Some(value) = parameters.get(name) {
        return Ok(value);
    }

    let not_found = || RuleError::FieldNotFound(name.to_string());
    let mut parts = name.split('.');
    let head = parts.next().ok_or_else(not_found)?;
    let mut current = parameters.get(head).ok_or_else(not_found)?;

    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part),
            Value::Array(arr) => part.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        }
        .ok_or_else(not_found)?;
    }

    Ok(current)
}

fn eval_unary(op: UnaryOp, value: ValuateValue) -> Result<ValuateValue> {
    match (op, value) {
        (UnaryOp::Not, ValuateValue::Bool(b)) => Ok(ValuateValue::Bool(!b)),
        (UnaryOp::Negate, ValuateValue::Number(n)) => Ok(ValuateValue::Number(-n)),
        (UnaryOp::Plus, ValuateValue::Number(n)) => Ok(ValuateValue::Number(n)),
        (op, value) => Err(RuleError::InvalidOperator {
            operator: match op {
                UnaryOp::Not => "!",
                UnaryOp::Negate => "-",
                UnaryOp::Plus => "+",
            }
            .to_string(),
            value_type: value.type_name().to_string(),
        }),
    }
}

fn eval_compare(op: CompareOp, left: &ValuateValue, right: &ValuateValue) -> Result<bool> {
    match op {
        CompareOp::Eq => Ok(left.strict_eq(right)),
        CompareOp::Neq => Ok(!left.strict_eq(right)),
        CompareOp::Match | CompareOp::NotMatch => {
            let subject = expect_string(left, op.symbol())?;
            let pattern = expect_string(right, op.symbol())?;
            let regex = Regex::new(pattern).map_err(|e| RuleError::RegexError {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            Ok(regex.is_match(subject) == (op == CompareOp::Match))
        }
        CompareOp::Gt | CompareOp::Lt | CompareOp::Gte | CompareOp::Lte => {
            let ordering = order(op, left, right)?;
            Ok(match op {
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Gte => ordering != Ordering::Less,
                _ => ordering != Ordering::Greater,
            })
        }
    }
}

/// 数字与数字、字符串与字符串（字典序）之间可以比较大小
fn order(op: CompareOp, left: &ValuateValue, right: &ValuateValue) -> Result<Ordering> {
    match (left, right) {
        (ValuateValue::Number(a), ValuateValue::Number(b)) => {
            a.partial_cmp(b).ok_or_else(|| RuleError::EvaluationError(format!(
                "无法比较 {} {} {}",
                a,
                op.symbol(),
                b
            )))
        }
        (ValuateValue::String(a), ValuateValue::String(b)) => Ok(a.cmp(b)),
        (a, b) => Err(RuleError::TypeMismatch {
            expected: format!("{} 两侧同为 number 或 string", op.symbol()),
            actual: format!("{} 与 {}", a.type_name(), b.type_name()),
        }),
    }
}

fn expect_string<'a>(value: &'a ValuateValue, operator: &str) -> Result<&'a str> {
    value.as_str().ok_or_else(|| RuleError::InvalidOperator {
        operator: operator.to_string(),
        value_type: value.type_name().to_string(),
    })
}

fn expect_bool(value: &ValuateValue, op: LogicOp) -> Result<bool> {
    value.as_bool().ok_or_else(|| RuleError::InvalidOperator {
        operator: match op {
            LogicOp::And => "&&",
            LogicOp::Or => "||",
        }
        .to_string(),
        value_type: value.type_name().to_string(),
    })
}
