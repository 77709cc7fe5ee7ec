//! CLI 模块
//!
//! 提供命令行接口，支持以下功能：
//!
//! - `compile` - 编译规则文本并输出规范化规则树
//! - `combine` - 组合多条规则
//! - `evaluate` - 针对事实记录评估规则
//!
//! # 使用示例
//!
//! ```bash
//! rule-engine compile "age > 30 AND department = 'Sales'"
//!
//! rule-engine combine --operator OR "age > 30" "salary > 50000"
//!
//! rule-engine evaluate --rule "age > 30" --facts '{"age": 35}' --explain
//!
//! rule-engine evaluate --ast rule.json --facts '{"age": 35}'
//! ```

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands};
pub use runner::CommandRunner;
