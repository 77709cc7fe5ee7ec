//! AST 资格规则引擎
//!
//! 将文本形式的资格规则编译为二叉规则树，并针对事实记录求值，支持：
//! - 规则文本词法分析与调度场解析（AND 优先于 OR，左结合）
//! - 多条规则按逻辑连接词组合
//! - 数值与字符串比较求值，以及带追踪的评估报告
//! - 规则树的规范化 JSON 编解码
//! - 带边界限制的规则服务与命令行入口

pub mod cli;
pub mod codec;
pub mod combiner;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod models;
pub mod operators;
pub mod parser;
pub mod service;
pub mod store;

pub use error::{EvalError, ParseError, Result, RuleError, ValidationError};
pub use evaluator::{ConditionEvaluator, Evaluator, MissingFieldPolicy};
pub use models::{Condition, EvaluationReport, FactRecord, FactValue, Literal, Rule, RuleNode};
pub use operators::{Comparator, LogicalOperator};
pub use service::RuleService;
pub use store::{RuleStore, RuleStoreStats};

pub use codec::{decode, encode};
pub use combiner::{combine, combine_with};
pub use parser::compile;

/// 使用默认策略评估规则树，缺失字段视为条件不成立
pub fn evaluate(tree: &RuleNode, facts: &FactRecord) -> std::result::Result<bool, EvalError> {
    Evaluator::default().evaluate(tree, facts)
}
