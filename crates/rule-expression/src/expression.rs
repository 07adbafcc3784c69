//! 规则表达式
//!
//! 构造时完成分词、括号折叠、SQL 转换、求值语法编译和语法树构建，
//! 之后实例不可变，可在多个线程间共享读取。

use crate::ast::{self, AstNode};
use crate::collapse::collapse;
use crate::config::CompilerLimits;
use crate::error::{Result, RuleError};
use crate::lexer::Lexer;
use crate::sql::{SqlQuery, to_sql};
use crate::token::{Token, tokens_to_expression};
use crate::valuate::{self, EvaluableExpression, ValuateValue};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, instrument, warn};

/// 规则表达式
///
/// 表达式无效时，除原始字符串、分词和变量名外其余字段均为空，
/// [`RuleExpression::evaluate`] 会直接返回错误。
#[derive(Debug, Clone)]
pub struct RuleExpression {
    expression: String,
    valid: bool,
    identities: Vec<String>,
    tokens: Vec<Token>,
    collapsed: Vec<Token>,
    sql: SqlQuery,
    valuate_tokens: Vec<Token>,
    expression_valuate: String,
    evaluable: Option<EvaluableExpression>,
    compile_error: Option<RuleError>,
    ast_root: Option<AstNode>,
    limits: CompilerLimits,
}

impl RuleExpression {
    pub fn new(expression: impl Into<String>) -> Self {
        Self::with_limits(expression, CompilerLimits::default())
    }

    #[instrument(skip_all, fields(expression = tracing::field::Empty, valid = tracing::field::Empty))]
    pub fn with_limits(expression: impl Into<String>, limits: CompilerLimits) -> Self {
        let expression = expression.into();
        let span = tracing::Span::current();
        span.record("expression", expression.as_str());

        let output = Lexer::with_limits(limits).tokenize(&expression);
        span.record("valid", output.valid);

        let mut rule = Self {
            expression,
            valid: output.valid,
            identities: output.identities,
            tokens: output.tokens,
            collapsed: Vec::new(),
            sql: SqlQuery::default(),
            valuate_tokens: Vec::new(),
            expression_valuate: String::new(),
            evaluable: None,
            compile_error: None,
            ast_root: None,
            limits,
        };

        if !rule.valid {
            debug!("表达式无效，跳过编译");
            return rule;
        }

        rule.collapsed = collapse(&rule.tokens);
        rule.sql = to_sql(&rule.tokens);
        rule.valuate_tokens = valuate::to_valuate_tokens(&rule.tokens);
        rule.expression_valuate = valuate::to_valuate_syntax(&rule.valuate_tokens);

        match valuate::compile_with_limits(&rule.expression_valuate, &limits) {
            Ok(evaluable) => rule.evaluable = Some(evaluable),
            Err(e) => {
                warn!(
                    syntax = %rule.expression_valuate,
                    error = %e,
                    "求值语法编译失败"
                );
                rule.compile_error = Some(e);
            }
        }

        rule.ast_root = ast::build(&rule.tokens);

        debug!(
            sql = %rule.sql.fragment,
            syntax = %rule.expression_valuate,
            "表达式编译完成"
        );
        rule
    }

    /// 原始表达式字符串
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// 表达式引用的变量名，去重并保持首次出现顺序
    pub fn identities(&self) -> &[String] {
        &self.identities
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// 括号折叠后的分词
    pub fn collapsed(&self) -> &[Token] {
        &self.collapsed
    }

    /// SQL 条件片段，占位符为 `?`
    pub fn expression_sql(&self) -> &str {
        &self.sql.fragment
    }

    /// 与 SQL 占位符顺序对应的参数
    pub fn parameters_sql(&self) -> &[Value] {
        &self.sql.parameters
    }

    pub fn sql_tokens(&self) -> &[Token] {
        &self.sql.tokens
    }

    pub fn sql(&self) -> &SqlQuery {
        &self.sql
    }

    pub fn valuate_tokens(&self) -> &[Token] {
        &self.valuate_tokens
    }

    /// 求值语法字符串
    pub fn expression_valuate(&self) -> &str {
        &self.expression_valuate
    }

    pub fn ast_root(&self) -> Option<&AstNode> {
        self.ast_root.as_ref()
    }

    /// 构造时记录的编译错误
    pub fn compile_error(&self) -> Option<&RuleError> {
        self.compile_error.as_ref()
    }

    pub fn limits(&self) -> CompilerLimits {
        self.limits
    }

    /// 以单个空格重新拼接分词得到的规范化表达式
    pub fn normalized(&self) -> String {
        tokens_to_expression(&self.tokens)
    }

    /// 重新校验原始表达式字符串
    pub fn validate_expression_string(&self) -> bool {
        Lexer::with_limits(self.limits).tokenize(&self.expression).valid
    }

    /// 使用参数求值
    ///
    /// 缺少变量、类型不匹配等错误直接返回；求值结果不是布尔值时返回 `false`。
    /// 表达式无效时返回 [`RuleError::InvalidExpression`]，
    /// 求值语法编译失败时返回 [`RuleError::EvaluationError`]。
    pub fn evaluate(&self, parameters: &HashMap<String, Value>) -> Result<bool> {
        if !self.valid {
            return Err(RuleError::InvalidExpression(self.expression.clone()));
        }
        let evaluable = self.evaluable.as_ref().ok_or_else(|| {
            RuleError::EvaluationError(match &self.compile_error {
                Some(e) => format!("表达式未编译: {}", e),
                None => format!("表达式未编译: {}", self.expression),
            })
        })?;

        match evaluable.evaluate(parameters)? {
            ValuateValue::Bool(result) => Ok(result),
            other => {
                debug!(result = %other, "求值结果不是布尔值，按 false 处理");
                Ok(false)
            }
        }
    }

    /// 校验表达式引用的变量名是否全部在允许列表中
    ///
    /// 允许列表为空时返回 `false`。
    pub fn validate_identities<S: AsRef<str>>(&self, allowed: &[S]) -> bool {
        if allowed.is_empty() {
            return false;
        }
        self.identities
            .iter()
            .all(|identity| allowed.iter().any(|a| a.as_ref() == identity))
    }
}

impl fmt::Display for RuleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}
