//! 规则表达式错误类型

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("表达式编译失败: {0}")]
    CompileError(String),

    #[error("表达式执行失败: {0}")]
    EvaluationError(String),

    #[error("无效的操作符: {operator} 不支持类型 {value_type}")]
    InvalidOperator {
        operator: String,
        value_type: String,
    },

    #[error("函数 {function} 参数错误: {reason}")]
    InvalidArguments { function: String, reason: String },

    #[error("变量不存在: {0}")]
    FieldNotFound(String),

    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("无效的正则表达式 '{pattern}': {reason}")]
    RegexError { pattern: String, reason: String },

    #[error("括号嵌套层级 {depth} 超过上限 {limit}")]
    NestingTooDeep { depth: usize, limit: usize },

    #[error("表达式无效: {0}")]
    InvalidExpression(String),
}

impl RuleError {
    /// 是否属于求值阶段的错误（缺少变量、类型不匹配、表达式无效或未编译等）
    pub fn is_evaluation(&self) -> bool {
        matches!(
            self,
            Self::EvaluationError(_)
                | Self::InvalidOperator { .. }
                | Self::InvalidArguments { .. }
                | Self::FieldNotFound(_)
                | Self::TypeMismatch { .. }
                | Self::RegexError { .. }
                | Self::InvalidExpression(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
