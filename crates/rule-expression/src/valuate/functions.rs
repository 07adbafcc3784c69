//! 自定义函数注册

use super::value::ValuateValue;
use crate::error::{Result, RuleError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 表达式中可调用的函数
pub type ExpressionFunction = Arc<dyn Fn(&[ValuateValue]) -> Result<ValuateValue> + Send + Sync>;

/// 函数注册表
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, ExpressionFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册字符串判断函数：contains、startsWith、endsWith 及其 not 版本
    pub fn predicates() -> Self {
        let mut registry = Self::new();
        registry
            .register_string_predicate("contains", |s, p| s.contains(p))
            .register_string_predicate("notContains", |s, p| !s.contains(p))
            .register_string_predicate("startsWith", |s, p| s.starts_with(p))
            .register_string_predicate("notStartsWith", |s, p| !s.starts_with(p))
            .register_string_predicate("endsWith", |s, p| s.ends_with(p))
            .register_string_predicate("notEndsWith", |s, p| !s.ends_with(p));
        registry
    }

    /// 注册函数，同名函数会被覆盖
    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(&[ValuateValue]) -> Result<ValuateValue> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    /// 注册接收两个字符串参数并返回布尔值的函数
    pub fn register_string_predicate<F>(&mut self, name: &'static str, predicate: F) -> &mut Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        self.register(name, move |args| {
            let [subject, pattern] = args else {
                return Err(RuleError::InvalidArguments {
                    function: name.to_string(),
                    reason: format!("需要 2 个参数，实际 {} 个", args.len()),
                });
            };
            let (Some(subject), Some(pattern)) = (subject.as_str(), pattern.as_str()) else {
                return Err(RuleError::InvalidArguments {
                    function: name.to_string(),
                    reason: format!(
                        "参数必须为字符串，实际为 ({}, {})",
                        subject.type_name(),
                        pattern.type_name()
                    ),
                });
            };
            Ok(ValuateValue::Bool(predicate(subject, pattern)))
        })
    }

    pub fn get(&self, name: &str) -> Option<&ExpressionFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}
