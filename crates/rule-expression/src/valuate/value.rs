//! 求值过程中的值类型

use serde_json::Value;
use std::fmt;

/// 求值结果
///
/// 所有数字统一为 `f64`，数组和对象保留为 JSON 值，仅支持相等比较。
#[derive(Debug, Clone, PartialEq)]
pub enum ValuateValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Json(Value),
}

impl ValuateValue {
    /// 获取值的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Json(Value::Array(_)) => "array",
            Self::Json(Value::Object(_)) => "object",
            Self::Json(_) => "json",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// 类型敏感的相等比较：字符串永远不等于数字
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Null, Self::Null) => true,
            (Self::Json(a), Self::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&Value> for ValuateValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Value::String(s) => Self::String(s.clone()),
            other => Self::Json(other.clone()),
        }
    }
}

impl From<bool> for ValuateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ValuateValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ValuateValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl fmt::Display for ValuateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "'{}'", s),
            Self::Json(v) => write!(f, "{}", v),
        }
    }
}
