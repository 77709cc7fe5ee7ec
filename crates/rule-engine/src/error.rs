//! 规则引擎错误类型
//!
//! 解析、校验、求值三类错误分别定义，`RuleError` 在边界层统一承载。

use thiserror::Error;

/// 规则文本解析错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("规则文本为空")]
    Empty,

    #[error("字符串未闭合: 起始于偏移 {offset}")]
    UnterminatedString { offset: usize },

    #[error("多余的右括号: 偏移 {offset}")]
    UnmatchedCloseParen { offset: usize },

    #[error("左括号未闭合: 偏移 {offset}")]
    UnclosedParen { offset: usize },

    #[error("逻辑连接词缺少操作数: 偏移 {offset}")]
    MissingOperand { offset: usize },

    #[error("条件 '{field}' 不完整: 偏移 {offset} 处期望{expected}")]
    IncompleteCondition {
        field: String,
        expected: &'static str,
        offset: usize,
    },

    #[error("意外的词元 '{token}': 偏移 {offset}")]
    UnexpectedToken { token: String, offset: usize },
}

/// 结构与输入校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("至少需要一条规则才能组合")]
    EmptyCombination,

    #[error("不支持的逻辑连接词: '{0}'，仅允许 AND 或 OR")]
    UnsupportedConnective(String),

    #[error("节点 '{path}' 结构无效: {reason}")]
    MalformedNode { path: String, reason: String },

    #[error("字段名无效: '{0}'，必须是单个不含空白与括号的词")]
    InvalidField(String),

    #[error("字面量无效: '{0}'")]
    InvalidLiteral(String),

    #[error("不允许的属性: '{0}'")]
    UnknownAttribute(String),

    #[error("规则文本过长: {length} 字节，上限 {max}")]
    RuleTooLong { length: usize, max: usize },

    #[error("括号嵌套过深: {depth} 层，上限 {max}")]
    NestingTooDeep { depth: usize, max: usize },

    #[error("规则树过深: {depth} 层，上限 {max}")]
    TreeTooDeep { depth: usize, max: usize },
}

/// 规则求值错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("字段不存在: {0}")]
    MissingField(String),

    #[error("字段 '{field}' 的值 '{value}' 不是数值")]
    NonNumericFact { field: String, value: String },

    #[error("条件 '{field}' 的字面量 '{literal}' 不是数值")]
    NonNumericLiteral { field: String, literal: String },
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解析失败: {0}")]
    Parse(#[from] ParseError),

    #[error("规则校验失败: {0}")]
    Validation(#[from] ValidationError),

    #[error("规则执行失败: {0}")]
    Eval(#[from] EvalError),

    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RuleError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "PARSE_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Eval(_) => "EVAL_ERROR",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::JsonError(_) => "INVALID_JSON",
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err: RuleError = ParseError::Empty.into();
        assert_eq!(err.code(), "PARSE_ERROR");

        let err: RuleError = ValidationError::EmptyCombination.into();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err: RuleError = EvalError::MissingField("age".to_string()).into();
        assert_eq!(err.code(), "EVAL_ERROR");

        assert_eq!(RuleError::RuleNotFound("x".to_string()).code(), "RULE_NOT_FOUND");
    }

    #[test]
    fn test_error_message_carries_offset() {
        let err = ParseError::UnclosedParen { offset: 13 };
        assert!(err.to_string().contains("13"));
    }
}
